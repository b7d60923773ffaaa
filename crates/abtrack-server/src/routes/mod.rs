pub mod collect;
pub mod health;
