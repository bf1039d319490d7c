mod checkout;
mod course;
mod enrollment;
mod profile;
mod referral;

pub use checkout::*;
pub use course::*;
pub use enrollment::*;
pub use profile::*;
pub use referral::*;
