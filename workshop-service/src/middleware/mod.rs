pub mod tenant;

pub use tenant::OrgContext;
