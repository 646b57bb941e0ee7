//! Built-in hardening categories, one module per category

mod apt;
mod limits;
mod login;
mod minimize_access;
mod pam;
mod profile;
mod securetty;
mod suid_sgid;
mod sysctl;

pub use apt::AptCategory;
pub use limits::LimitsCategory;
pub use login::LoginCategory;
pub use minimize_access::MinimizeAccessCategory;
pub use pam::PamCategory;
pub use profile::ProfileCategory;
pub use securetty::SecurettyCategory;
pub use suid_sgid::SuidSgidCategory;
pub use sysctl::SysctlCategory;
