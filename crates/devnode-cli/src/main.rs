//! devnode CLI - open a device by major/minor, with or without a /dev entry

use std::fs::File;
use std::io::Read;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use devnode::{Access, DeviceDescriptor, DeviceType, OpenRequest, Opener, Strategy, dispatch};

#[derive(Parser)]
#[command(name = "devnode")]
#[command(author, version, about = "Open a device node even when /dev does not list it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a device and report what was opened
    Open {
        /// Device type: character or block
        #[arg(long = "type", default_value = "character")]
        kind: DeviceType,

        /// Major number
        #[arg(long)]
        major: u32,

        /// Minor number
        #[arg(long)]
        minor: u32,

        /// Open mode: r, w or r+
        #[arg(short, long, default_value = "r")]
        flags: Access,

        /// auto, search or tmpfs
        #[arg(short, long, default_value = "auto")]
        strategy: Strategy,

        /// Read this many bytes and print them as hex
        #[arg(short, long)]
        read: Option<usize>,

        /// Device directory to search
        #[arg(long, default_value = "/dev")]
        dev_dir: PathBuf,

        /// Maximum scanned path length
        #[arg(long, default_value_t = 4096)]
        max_path: usize,
    },

    /// Report whether this host allows creating transient nodes
    Probe,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("devnode=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Open {
            kind,
            major,
            minor,
            flags,
            strategy,
            read,
            dev_dir,
            max_path,
        } => {
            let device = DeviceDescriptor::new(kind, major, minor);
            let request = OpenRequest::new(device, flags).strategy(strategy);
            let opener = Opener::new().dev_dir(dev_dir).max_path(max_path);

            let fd = match dispatch::open(opener, request).await {
                Ok(fd) => fd,
                Err(e) => {
                    let via = e.strategy().map_or_else(String::new, |s| format!(" ({s})"));
                    eprintln!("failed to open {device}{via}: {e} [{:?}]", e.kind());
                    return Ok(ExitCode::FAILURE);
                }
            };

            let st = rustix::fs::fstat(&fd)?;
            println!(
                "fd {} -> {} {}:{}",
                fd.as_raw_fd(),
                kind,
                rustix::fs::major(st.st_rdev),
                rustix::fs::minor(st.st_rdev)
            );

            if let Some(len) = read {
                let mut buf = vec![0u8; len];
                let n = File::from(fd).read(&mut buf)?;
                println!("{}", hex(&buf[..n]));
            }
        }

        Commands::Probe => match devnode_sys::check() {
            Ok(info) => {
                let (maj, min, patch) = info.kernel_version;
                println!("kernel: {maj}.{min}.{patch}");
                println!("CAP_SYS_ADMIN: {}", info.cap_sys_admin);
                println!("mount namespaces: {}", info.mount_namespaces);
                println!(
                    "strategies: {}",
                    if info.can_create_transient() {
                        "auto, search, tmpfs"
                    } else {
                        "search"
                    }
                );
            }
            Err(e) => {
                eprintln!("probe failed: {e}");
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
