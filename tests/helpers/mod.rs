pub mod builders;
pub mod db;

#[allow(unused_imports)]
pub use builders::UserBuilder;
pub use db::TestDb;
