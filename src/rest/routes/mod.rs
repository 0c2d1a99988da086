pub mod accounts;
pub mod books;
pub mod health;
