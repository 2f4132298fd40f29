use vidcresp_packet::{
    BUFFER_PAYLOAD_SIZE, DEFAULT_MAX_RESPONSE, HEADER_SIZE, PACKET_HEADER_SIZE, VERSION_LENGTH,
};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

fn build_value(value: Option<&'static str>) -> &'static str {
    value.unwrap_or("unknown")
}

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("vidcresp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: vidcresp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", build_value(option_env!("VIDCRESP_BUILD_TARGET")));
    println!("profile: {}", build_value(option_env!("VIDCRESP_BUILD_PROFILE")));
    println!("rustc: {}", build_value(option_env!("VIDCRESP_BUILD_RUSTC")));
    println!("features: async={}, cli=true", cfg!(feature = "async"));
    println!(
        "hfi: response_header={HEADER_SIZE} packet_header={PACKET_HEADER_SIZE} \
         buffer_payload={BUFFER_PAYLOAD_SIZE} image_version={VERSION_LENGTH}"
    );
    println!("max_response_size: {DEFAULT_MAX_RESPONSE}");

    Ok(SUCCESS)
}
