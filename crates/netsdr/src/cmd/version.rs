use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("netsdr {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: netsdr");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("NETSDR_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "defaults: host={} tcp_port={} udp_port={} output={}",
        crate::settings::DEFAULT_HOST,
        crate::settings::DEFAULT_TCP_PORT,
        crate::settings::DEFAULT_UDP_PORT,
        netsdr_session::DEFAULT_OUTPUT_FILE
    );

    Ok(SUCCESS)
}
