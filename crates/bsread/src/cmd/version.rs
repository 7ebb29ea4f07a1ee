use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("bsread {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: bsread");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("BSREAD_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "protocol: {} / {}",
        bsread_protocol::MAIN_HEADER_TYPE,
        bsread_protocol::DATA_HEADER_TYPE
    );
    println!(
        "features: stream={}, cli=true",
        cfg!(feature = "stream")
    );

    Ok(SUCCESS)
}
