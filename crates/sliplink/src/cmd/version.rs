use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    let version = env!("CARGO_PKG_VERSION");
    if !args.extended {
        println!("sliplink {version}");
        return Ok(SUCCESS);
    }

    let lines = [
        ("name", "sliplink".to_string()),
        ("version", version.to_string()),
        ("target", env!("SLIPLINK_TARGET_TRIPLE").to_string()),
        ("target_os", std::env::consts::OS.to_string()),
        ("target_arch", std::env::consts::ARCH.to_string()),
        (
            "features",
            format!(
                "link={}, async={}, cli=true",
                cfg!(feature = "link"),
                cfg!(feature = "async")
            ),
        ),
    ];
    for (key, value) in lines {
        println!("{key}: {value}");
    }

    Ok(SUCCESS)
}
