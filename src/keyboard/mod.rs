pub mod finger;
