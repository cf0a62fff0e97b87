use std::fs::File;
use std::io::{self, Write};

use amqwire_frame::{FrameWriter, AMQP_HEADER, SASL_HEADER};
use serde_json::Value;

use crate::cmd::EncodeArgs;
use crate::exit::{encode_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::Body;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let body = args.body.as_deref().map(parse_body).transpose()?;
    let extended_header = match args.extended_header.as_deref() {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };
    let payload = args.payload.unwrap_or_default();
    let body_bytes = match &body {
        Some(body) => serde_json::to_vec(body).map_err(|err| encode_error("encode", err.into()))?,
        None => Vec::new(),
    };

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .map_err(|err| io_error(&format!("create {}", path.display()), err))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let header = if args.sasl { SASL_HEADER } else { AMQP_HEADER };
    let mut writer = FrameWriter::with_protocol_header(out, header);
    if args.no_header {
        writer = writer.skip_protocol_header();
    }

    writer
        .send_raw(args.channel, &extended_header, &body_bytes, payload.as_bytes())
        .map_err(|err| encode_error("encode", err))?;

    tracing::debug!(
        channel = args.channel,
        extended_header_len = extended_header.len(),
        body_len = body_bytes.len(),
        payload_len = payload.len(),
        "frame encoded"
    );
    Ok(SUCCESS)
}

fn parse_body(text: &str) -> CliResult<Body> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::usage("--body must be a JSON object")),
        Err(err) => Err(CliError::usage(format!("invalid --body JSON: {err}"))),
    }
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .trim_start_matches("0x")
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(CliError::usage(format!("invalid hex in --extended-header: {text}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::usage("--extended-header must have an even number of hex digits"));
    }

    Ok(digits
        .chunks(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn hex_parses_with_prefix_and_spaces() {
        assert_eq!(parse_hex("0xde ad BE ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn hex_rejects_odd_length_and_bad_digits() {
        assert_eq!(parse_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("+f").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("0a-1").unwrap_err().code, USAGE);
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(parse_body(r#"{"open":{"container-id":"c1"}}"#).is_ok());
        assert_eq!(parse_body("[1,2]").unwrap_err().code, USAGE);
        assert_eq!(parse_body("{").unwrap_err().code, USAGE);
    }
}
