// Copyright 2024 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use localpv_extender::config::ServerArgs;
use localpv_extender::run;
use shadow_rs::shadow;

shadow!(build);

#[derive(Parser)]
#[command(name = "localpv-extender")]
#[command(
    about = "Kubernetes scheduler extender for node-local persistent volumes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extender HTTP server
    Server(ServerArgs),

    /// Print build information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run(args).await?,
        Commands::Version => {
            println!("localpv-extender {}", build::PKG_VERSION);
            println!("branch:  {}", build::BRANCH);
            println!("commit:  {}", build::SHORT_COMMIT);
            println!("built:   {}", build::BUILD_TIME);
            println!("rustc:   {}", build::RUST_VERSION);
        }
    }

    Ok(())
}
