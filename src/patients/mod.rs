//! Patient profiles: the persona the chat assistant tailors its advice to.

mod model;
mod store;

pub use model::{split_list, Gender, Patient, PatientFields, PatientInput};
pub use store::PatientStore;
