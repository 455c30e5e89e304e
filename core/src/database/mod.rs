pub mod batch_insert;
pub mod executor;
pub mod postgres;
pub mod record;
pub mod recordset;
pub mod transform;
pub mod value;
