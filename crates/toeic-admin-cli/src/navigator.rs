use toeic_admin_core::auth::Navigator;

/// Terminal stand-in for the console's router.
///
/// The "route" is the running command. A redirect to login cannot switch
/// screens here, so it tells the user how to sign in again.
pub struct CliNavigator {
    route: String,
}

impl CliNavigator {
    pub fn new(route: impl Into<String>) -> Self {
        Self { route: route.into() }
    }

    fn hint(target: &str) -> String {
        format!(
            "Session expired or rejected ({}). Run `toeic-admin login` to sign in again.",
            target
        )
    }
}

impl Navigator for CliNavigator {
    fn current_route(&self) -> Option<String> {
        Some(self.route.clone())
    }

    fn redirect(&self, route: &str) {
        eprintln!("{}", Self::hint(route));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_command_route() {
        let nav = CliNavigator::new("/status");
        assert_eq!(nav.current_route().as_deref(), Some("/status"));
    }

    #[test]
    fn test_hint_names_login_command() {
        assert!(CliNavigator::hint("/login").contains("toeic-admin login"));
    }
}
