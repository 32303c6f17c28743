use crate::views::TEMPLATES;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "moviweb")]
#[command(about = "Keep track of the movies your users have seen", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "MOVIWEB_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Directory of the movie database
    #[arg(long, env = "MOVIWEB_DATABASE", default_value = "moviweb.db")]
    pub database: PathBuf,

    /// Glob matching the page templates
    #[arg(long, env = "MOVIWEB_TEMPLATES", default_value = TEMPLATES)]
    pub templates: String,

    /// Keep the database in memory and drop it on exit
    #[arg(long)]
    pub temporary: bool,

    /// Add a demo user and movie if there are no users yet
    #[arg(long)]
    pub seed: bool,
}

impl Config {
    pub fn open_db(&self) -> sled::Result<sled::Db> {
        let config = sled::Config::new().temporary(self.temporary);
        if self.temporary {
            config.open()
        } else {
            config.path(&self.database).open()
        }
    }
}
