pub mod check;
pub mod record;
