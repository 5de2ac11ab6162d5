//! Allow-list authorizer backed by the configuration file.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::warn;
use workflow::{Action, AuthorizationError, Authorizer, PackageRef, UserLogin};

/// Grants the configured actions on every package, and nothing else.
#[derive(Debug)]
pub struct AllowListAuthorizer {
    allowed: HashSet<Action>,
}

impl AllowListAuthorizer {
    pub fn new(allowed: impl IntoIterator<Item = Action>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for AllowListAuthorizer {
    async fn authorize(
        &self,
        executor: &UserLogin,
        action: Action,
        target: &PackageRef,
    ) -> Result<(), AuthorizationError> {
        if self.allowed.contains(&action) {
            return Ok(());
        }
        warn!(%executor, %action, %target, "action not in allow-list");
        Err(AuthorizationError {
            executor: executor.clone(),
            action,
            target: target.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use workflow::{PackageName, ProjectName};

    fn target() -> PackageRef {
        PackageRef::new(
            ProjectName::new("home:Iggy").unwrap(),
            PackageName::new("hello").unwrap(),
        )
    }

    #[rstest]
    #[case(vec![Action::Branch, Action::Rebuild], Action::Rebuild, true)]
    #[case(vec![Action::Branch], Action::Branch, true)]
    #[case(vec![Action::Branch], Action::Rebuild, false)]
    #[case(vec![], Action::Branch, false)]
    #[tokio::test]
    async fn grants_only_listed_actions(
        #[case] allowed: Vec<Action>,
        #[case] action: Action,
        #[case] granted: bool,
    ) {
        let authorizer = AllowListAuthorizer::new(allowed);
        let executor = UserLogin::new("Iggy").unwrap();

        let result = authorizer.authorize(&executor, action, &target()).await;

        assert_eq!(result.is_ok(), granted);
        if let Err(err) = result {
            assert_eq!(err.to_string(), format!("Iggy is not authorized to {action} home:Iggy/hello"));
        }
    }
}
