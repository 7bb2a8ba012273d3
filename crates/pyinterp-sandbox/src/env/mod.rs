//! Dependency environment: which requirements are already importable, and
//! on-demand installs of the rest into an isolated directory.
//!
//! The facade hands a request's requirements to [`DependencyResolver`]; the
//! executor only ever sees the resulting search path.

pub mod installer;
pub mod resolver;

pub use installer::{validate_package_name, InstallError, PackageInstaller, PipInstaller};
pub use resolver::{DependencyResolver, EnvironmentSetup, InstallOutcome, ResolutionPlan};
