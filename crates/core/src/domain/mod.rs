pub mod leave;
pub mod lecture;
pub mod offer;
pub mod teacher;
