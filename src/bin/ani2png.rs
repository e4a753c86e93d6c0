// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extract the frames of an animated cursor, or print the layout of an
//! ANI, ICO or PNG file field by field.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ani2png::{
    AniFile, DecodeConfig, ImageFormat, IcoFile, PngNarration, ResourceType, Signature, Table, describe_ani_with_config,
    describe_ico, describe_png,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;

const USAGE: &str = "\
$ ani2png FILE.ani OUTPUT_DIR
$ ani2png ani FILE.ani
$ ani2png ico FILE.ico
$ ani2png png FILE.png";

/// Delay written to the cursor template when the file has no default rate.
const PLACEHOLDER_DELAY_MS: u32 = 50;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Skip the pad byte after odd-length RIFF chunks.
    #[arg(long, global = true)]
    word_aligned: bool,

    /// Accept INFO lists and skip unknown chunks instead of failing.
    #[arg(long, global = true)]
    lenient: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Parser)]
enum Mode {
    /// Writes every frame of an animated cursor as an .ico file, plus a cursor config template.
    Ani2png(ExtractArgs),

    /// Prints the fields of an animated cursor.
    Ani(InputFileArgs),

    /// Prints the fields of an icon or cursor file, and of any PNG images inside it.
    Ico(InputFileArgs),

    /// Prints the chunks of a PNG file.
    Png(InputFileArgs),

    /// `FILE.ani OUTPUT_DIR`, the same as `ani2png`.
    #[command(external_subcommand)]
    Shorthand(Vec<OsString>),
}

#[derive(Parser)]
struct ExtractArgs {
    #[arg(value_name = "FILE.ani")]
    input_file: PathBuf,
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,
}

#[derive(Parser)]
struct InputFileArgs {
    input_file: PathBuf,
}

fn set_up_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

fn bad_usage() -> ExitCode {
    println!("{USAGE}");
    ExitCode::from(255)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprint!("{err}");
            return bad_usage();
        },
    };
    set_up_logging();

    let config = DecodeConfig::default()
        .with_word_aligned_chunks(cli.word_aligned)
        .lenient(cli.lenient);

    let result = match cli.mode {
        Mode::Ani2png(args) => extract(&args.input_file, &args.output_dir, &config),
        Mode::Shorthand(args) => match &args[..] {
            [input_file, output_dir] => extract(Path::new(input_file), Path::new(output_dir), &config),
            _ => return bad_usage(),
        },
        Mode::Ani(args) => print_ani(&args.input_file, &config),
        Mode::Ico(args) => print_ico(&args.input_file),
        Mode::Png(args) => print_png(&args.input_file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        },
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| path.display().to_string())?;
    log::info!("{} (size={}) was read", path.display(), data.len());
    Ok(data)
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| path.display().to_string())?;
    println!("> {} (size={}) was written", path.display(), data.len());
    Ok(())
}

/// One line of the xcursorgen config for frame `index`.
fn template_line(ani: &AniFile, index: usize, stem: &str, delay_ms: u32) -> String {
    let entry = match ani.icon_directory(index) {
        Some(Ok(ico)) => ico.directory.first().copied().map(|entry| (ico.resource_type(), entry)),
        Some(Err(err)) => {
            warn!("frame #{index} is not an icon ({err}); using the animation header size");
            None
        },
        None => None,
    };
    let (size, hotspot) = match entry {
        Some((Some(ResourceType::Cursor), entry)) => (entry.pixel_width(), entry.hotspot()),
        Some((_, entry)) => (entry.pixel_width(), (0, 0)),
        None => (ani.header.map_or(0, |h| h.width), (0, 0)),
    };
    format!("{size} {} {} {stem}_{index}.png {delay_ms}", hotspot.0, hotspot.1)
}

fn extract(input_file: &Path, output_dir: &Path, config: &DecodeConfig) -> Result<()> {
    let data = read_input(input_file)?;
    let ani = AniFile::from_bytes_with_config(&data, config).with_context(|| input_file.display().to_string())?;

    let stem = match input_file.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => bail!("{}: no file name", input_file.display()),
    };
    let delay_ms = match ani.header.map(|h| h.default_rate_ms()) {
        Some(ms) if ms > 0 => ms,
        _ => PLACEHOLDER_DELAY_MS,
    };
    let mut template = String::new();
    for index in 0..ani.icons.len() {
        writeln!(template, "{}", template_line(&ani, index, &stem, delay_ms))?;
    }

    fs::create_dir_all(output_dir).with_context(|| output_dir.display().to_string())?;
    for (index, icon) in ani.icons.iter().enumerate() {
        write_output(&output_dir.join(format!("{stem}_{index}.ico")), icon)?;
    }
    write_output(&output_dir.join(format!("{stem}.cursor")), template.as_bytes())
}

fn print_ani(input_file: &Path, config: &DecodeConfig) -> Result<()> {
    let data = read_input(input_file)?;
    let mut table = Table::new();
    let mut failure = None;
    for record in describe_ani_with_config(&data, config).with_context(|| input_file.display().to_string())? {
        match record {
            Ok(record) => table.push(record),
            Err(err) => {
                failure = Some(err);
                break;
            },
        }
    }
    print!("{table}");
    match failure {
        Some(err) => Err(err).with_context(|| input_file.display().to_string()),
        None => Ok(()),
    }
}

fn print_png_narration(narration: PngNarration<'_>) {
    match narration.signature() {
        Signature::TooShort => println!("> data too small to contain png signature!"),
        Signature::Mismatch => println!("> png signature (the leading 8 bytes) is incorrect!"),
        Signature::Valid => {
            for warning in narration.walk().warnings.iter() {
                println!("> {warning}");
            }
            let table: Table<'_> = narration.collect();
            print!("{table}");
        },
    }
}

fn print_ico(input_file: &Path) -> Result<()> {
    let data = read_input(input_file)?;
    let narration = describe_ico(&data).with_context(|| input_file.display().to_string())?;
    let images: Vec<(usize, usize)> = {
        let ico: &IcoFile = narration.ico();
        (0..ico.image_count())
            .filter(|&i| matches!(ico.image_format(&data, i), Ok(ImageFormat::Png)))
            .filter_map(|i| Some((i, ico.directory[i].data_range()?.start)))
            .collect()
    };
    let table: Table<'_> = narration.collect();
    print!("{table}");

    for (index, offset) in images {
        println!();
        println!("> image #{index} is a PNG at {offset}");
        print_png_narration(describe_png(&data, offset)?);
    }
    Ok(())
}

fn print_png(input_file: &Path) -> Result<()> {
    let data = read_input(input_file)?;
    print_png_narration(describe_png(&data, 0)?);
    Ok(())
}
