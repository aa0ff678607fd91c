use clap::Parser;

mod commands;
mod execute;

use commands::Commands;

#[derive(Parser)]
#[command(name = "kubeprep")]
#[command(about = "Prepare a fleet of hosts for a kubeadm bootstrap", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    if let Err(e) = kubeprep_utils::tracing::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
    }

    cli.command.execute().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn install_flags_parse() {
        let cli = Cli::try_parse_from([
            "kubeprep",
            "-vv",
            "install",
            "-m",
            "cluster.yaml",
            "--force-install",
            "--workdir",
            "/tmp/prep",
            "--reboot-grace",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Install {
            manifest,
            force_install,
            workdir,
            reboot_grace,
        } = cli.command
        else {
            panic!("expected install command");
        };
        assert_eq!(manifest, PathBuf::from("cluster.yaml"));
        assert!(force_install);
        assert_eq!(workdir, "/tmp/prep");
        assert_eq!(reboot_grace, 5);
    }

    #[test]
    fn install_defaults() {
        let cli = Cli::try_parse_from(["kubeprep", "install", "-m", "cluster.yaml"]).unwrap();
        let Commands::Install {
            force_install,
            workdir,
            reboot_grace,
            ..
        } = cli.command
        else {
            panic!("expected install command");
        };
        assert!(!force_install);
        assert_eq!(workdir, "kubeprep");
        assert_eq!(reboot_grace, kubeprep_core::DEFAULT_REBOOT_GRACE.as_secs());
    }

    #[test]
    fn generate_requires_output() {
        assert!(Cli::try_parse_from(["kubeprep", "generate", "-m", "cluster.yaml"]).is_err());
    }
}
