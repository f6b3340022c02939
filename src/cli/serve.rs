// src/cli/serve.rs — `zabot serve`

use crate::app::{self, App};
use crate::infra::config::Config;
use crate::plugins;

pub async fn run_serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let app = App::bootstrap(config, &plugins::catalog())?;
    app::serve(app).await
}
