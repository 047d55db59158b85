// Terminal presentation
//
// - progress.rs: live progress monitor for running wipe tasks
// - table.rs: device table for selection and listing

pub mod progress;
pub mod table;
