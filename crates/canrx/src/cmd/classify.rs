use canrx_frame::{Filter, INV_FILTER};

use crate::cmd::ClassifyArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_classification, Classification, OutputFormat};

pub fn run(args: ClassifyArgs, format: OutputFormat) -> CliResult<i32> {
    let mut id = parse_hex_arg("id", &args.id)?;
    let mask = parse_hex_arg("mask", &args.mask)?;
    if args.invert {
        id |= INV_FILTER;
    }

    let filter = Filter::new(id, mask);
    let (bucket, normalized) = canrx_core::classify(filter);
    print_classification(&Classification::new(filter, bucket, normalized), format);
    Ok(SUCCESS)
}

fn parse_hex_arg(name: &str, value: &str) -> CliResult<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
        .map_err(|err| CliError::new(USAGE, format!("invalid {name} {value:?}: {err}")))
}
