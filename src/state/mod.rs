pub mod verified_store;

pub use verified_store::{
    create_shared_verified_store, SharedVerifiedStore, VerifiedStore, VerifiedUser,
};
