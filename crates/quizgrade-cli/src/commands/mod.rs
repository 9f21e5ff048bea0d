pub mod grade;
pub mod init;
pub mod reduce;
pub mod validate;
