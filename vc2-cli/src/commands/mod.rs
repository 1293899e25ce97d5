//! CLI subcommand implementations.

pub mod decode;
pub mod encode;

pub use decode::CmdDecode;
pub use encode::CmdEncode;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use anyhow::Context;

/// Open an input file, with `-` meaning standard input.
pub fn open_input(name: &str) -> anyhow::Result<Box<dyn Read>> {
    if name == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file =
            File::open(name).with_context(|| format!("failed to open input file \"{}\"", name))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open an output file, with `-` meaning standard output.
pub fn open_output(name: &str) -> anyhow::Result<Box<dyn Write>> {
    if name == "-" {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        let file = File::create(name)
            .with_context(|| format!("failed to open output file \"{}\"", name))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
