//! Show client and server versions

use super::{Command, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::ui::UI;

/// Version of this client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct VersionCommand {
    api: SquadApi,
}

impl VersionCommand {
    pub fn new(api: SquadApi) -> Self {
        VersionCommand { api }
    }
}

impl Command for VersionCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        ui.output(&format!("squad-client: {}", VERSION))?;
        ui.output(&format!("squad server: {}", self.api.server_version()?))?;
        Ok(SUCCESS)
    }

    fn name(&self) -> &str {
        "version"
    }

    fn help(&self) -> &str {
        "display versions of squad-client and server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use mockito::Server;

    #[test]
    fn test_version() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/version/")
            .with_body("\"1.74\"")
            .create();

        let mut ui = TestUI::new();
        let cmd = VersionCommand::new(SquadApi::configure(&server.url(), None).unwrap());
        assert_eq!(cmd.execute(&mut ui).unwrap(), SUCCESS);
        assert_eq!(
            ui.output,
            vec![
                format!("squad-client: {}", VERSION),
                "squad server: 1.74".to_string(),
            ]
        );
    }
}
