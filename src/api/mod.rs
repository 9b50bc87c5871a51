pub mod combined;
pub mod leave_applications;
pub mod leave_details;
pub mod leave_operations;
pub mod leave_types;
pub mod profile;
pub mod remaining_leaves;
pub mod users;
