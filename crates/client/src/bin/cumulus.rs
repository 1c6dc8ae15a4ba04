//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Cumulus CLI — command-line front-end for the storage service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cumulus_client::CloudClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cumulus", version, about = "Cumulus cloud storage client")]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    server: SocketAddr,

    /// Account username
    #[arg(short, long)]
    username: String,

    /// Account password
    #[arg(short, long)]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the account (no login)
    CreateAccount {
        #[arg(long, default_value = "")]
        email: String,
    },
    /// List your files
    Ls,
    /// Upload a local file
    Upload {
        path: PathBuf,
        /// Target directory id ("root" for the top level)
        #[arg(long, default_value = "root")]
        dir: String,
    },
    /// Download a file to a local path
    Download { file_id: Uuid, out: PathBuf },
    /// Delete a file
    Rm { file_id: Uuid },
    /// Move a file into a directory ("root" for the top level)
    Mv { file_id: Uuid, dir: String },
    /// Create a directory
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// List files and subdirectories of a directory
    Contents {
        #[arg(long, default_value = "root")]
        dir: String,
    },
    /// Rename a directory
    RenameDir { directory_id: Uuid, new_name: String },
    /// Delete a directory
    Rmdir {
        directory_id: Uuid,
        #[arg(long)]
        recursive: bool,
    },
}

fn parse_dir(value: &str) -> Result<Option<Uuid>> {
    if value.eq_ignore_ascii_case("root") {
        Ok(None)
    } else {
        Ok(Some(value.parse().context("invalid directory id")?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut client = CloudClient::connect(cli.server)
        .await
        .context("failed to connect to server")?;

    if let Commands::CreateAccount { email } = &cli.command {
        let user_id = client
            .create_account(&cli.username, &cli.password, email)
            .await
            .context("account creation failed")?;
        println!("account created: {user_id}");
        return Ok(());
    }

    client
        .login(&cli.username, &cli.password)
        .await
        .context("login failed")?;

    match cli.command {
        Commands::CreateAccount { .. } => unreachable!("handled before login"),
        Commands::Ls => {
            let files = client.list_files().await?;
            if files.is_empty() {
                println!("(no files)");
            }
            for file in files {
                println!(
                    "{}  {:>12}  {}  {}",
                    file.id,
                    file.file_size,
                    if file.is_complete { "complete" } else { "partial " },
                    file.file_name
                );
            }
        }
        Commands::Upload { path, dir } => {
            let dir = parse_dir(&dir)?;
            let file_id = client
                .upload_file(&path, dir)
                .await
                .context("upload failed")?;
            println!("uploaded: {file_id}");
        }
        Commands::Download { file_id, out } => {
            client
                .download_to(file_id, &out)
                .await
                .context("download failed")?;
            println!("downloaded {} to {}", file_id, out.display());
        }
        Commands::Rm { file_id } => {
            let result = client.delete_file(file_id).await?;
            println!("{}", result.message);
        }
        Commands::Mv { file_id, dir } => {
            let target = parse_dir(&dir)?;
            let result = client.move_file(file_id, target).await?;
            println!("{}", result.message);
        }
        Commands::Mkdir { name, parent } => {
            let result = client.create_directory(&name, parent).await?;
            match result.directory_id {
                Some(id) => println!("created directory {id}"),
                None => println!("{}", result.message),
            }
        }
        Commands::Contents { dir } => {
            let dir = parse_dir(&dir)?;
            let contents = client.directory_contents(dir).await?;
            for d in &contents.directories {
                println!("{}  <dir>  {}", d.id, d.name);
            }
            for f in &contents.files {
                println!("{}  {:>12}  {}", f.id, f.file_size, f.file_name);
            }
            if contents.directories.is_empty() && contents.files.is_empty() {
                println!("(empty)");
            }
        }
        Commands::RenameDir {
            directory_id,
            new_name,
        } => {
            let result = client.rename_directory(directory_id, &new_name).await?;
            println!("{}", result.message);
        }
        Commands::Rmdir {
            directory_id,
            recursive,
        } => {
            let result = client.delete_directory(directory_id, recursive).await?;
            println!("{}", result.message);
        }
    }

    let _ = client.logout().await;
    Ok(())
}
