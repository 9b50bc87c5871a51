pub mod email_index;
