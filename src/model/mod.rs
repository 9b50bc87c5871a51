pub mod employee;
pub mod leave_application;
pub mod leave_detail;
pub mod leave_type;
pub mod profile;
pub mod remaining_leave;
pub mod role;
