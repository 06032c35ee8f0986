//! Identity lookup with first-run bootstrap.

use tracing::{info, instrument};

use crate::core::classifier::FailureClass;
use crate::core::types::Step;
use crate::error::{Error, Result, StepExt};
use crate::io::executor::CommandRunner;
use crate::io::profile::ProfileHome;
use crate::io::rad::Rad;

pub struct IdentityManager<'a, R: ?Sized> {
    runner: &'a R,
    profile: &'a ProfileHome,
    alias: &'a str,
}

impl<'a, R: CommandRunner + ?Sized> IdentityManager<'a, R> {
    pub fn new(runner: &'a R, profile: &'a ProfileHome, alias: &'a str) -> Self {
        Self {
            runner,
            profile,
            alias,
        }
    }

    /// Return the identity for this profile home, creating one on first run.
    ///
    /// "Profile not found" triggers exactly one `rad auth` followed by one
    /// more `rad self`. Everything else, including a second failure after
    /// bootstrap, is returned unchanged.
    #[instrument(skip_all, fields(profile_home = %self.profile.path().display()))]
    pub fn get_identity(&self) -> Result<String> {
        self.profile.ensure()?;
        let rad = Rad::new(self.runner);
        let home = self.profile.path();

        match rad.self_identity(home) {
            Ok(identity) => Ok(identity),
            Err(err) if err.failure_class() == FailureClass::ProfileNotFound => {
                info!(alias = self.alias, "no profile yet, creating identity");
                self.profile.ensure()?;
                rad.auth(home, self.alias).at(Step::Auth)?;
                rad.self_identity(home).at(Step::Identity)
            }
            Err(source) => Err(Error::Step {
                step: Step::Identity,
                source,
            }),
        }
    }
}
