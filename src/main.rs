//! RGB control CLI tool
//!
//! Drives the RGB header of MSI mainboards through the Super I/O chip and the lighting of
//! Mountain keyboards over HID.

use std::fmt::{self, Debug, Display, Formatter};
use std::io::{self, Write};
use std::num::ParseIntError;
use std::process;
use std::str::FromStr;

use clap::builder::EnumValueParser;
use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches,
    Command, ValueEnum,
};
use env_logger::Env;
use hidapi::HidApi;

use crate::controller::HidTransport;
use crate::error::Error;
use crate::mountain_keyboard::{ColorMode, ColorSetup, MountainKeyboard};
use crate::msi_rgb::MsiRgb;
use crate::superio::DevPort;

mod controller;
mod dmi;
mod error;
mod mountain_keyboard;
mod msi_rgb;
mod superio;

/// Default effect speed.
const DEFAULT_SPEED: u8 = 50;

/// Keyboard lighting effect.
#[derive(ValueEnum, Default, PartialEq, Eq, Debug, Copy, Clone)]
enum Effect {
    Off,
    #[default]
    Static,
    Wave,
    Tornado,
    Breathing,
    Matrix,
    Reactive,
}

impl Effect {
    /// Check if the effect is animated.
    fn is_animated(self) -> bool {
        !matches!(self, Effect::Off | Effect::Static)
    }
}

/// RGB color.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Rgb, Error> {
        let chars = match s.strip_prefix("0x") {
            Some(chars) if chars.len() == 6 && chars.bytes().all(|b| b.is_ascii_hexdigit()) => {
                chars
            },
            _ => return Err(Error::InvalidColor(s.into())),
        };

        match u32::from_str_radix(chars, 16) {
            Ok(mut color) => {
                let b = (color & 0xff) as u8;
                color >>= 8;
                let g = (color & 0xff) as u8;
                color >>= 8;
                let r = color as u8;
                Ok(Rgb { r, g, b })
            },
            Err(_) => Err(Error::InvalidColor(s.into())),
        }
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// LED brightness.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
struct Brightness(u8);

impl Brightness {
    const fn max_value() -> Self {
        Self(100)
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::max_value()
    }
}

impl FromStr for Brightness {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Brightness(u8::from_str(s)?))
    }
}

impl Display for Brightness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// New keyboard lighting config.
#[derive(Debug)]
struct Config {
    effect: Effect,
    colors: ColorMode,
    brightness: Brightness,
    speed: u8,
    direction: u8,
    slot: Option<u8>,
    interactive: bool,
}

impl Config {
    fn from_cli(matches: &ArgMatches) -> Self {
        let mut config = Config::default();

        let rainbow = matches.get_flag("rainbow");

        config.effect = *required_enum::<Effect>(matches, "effect");

        if rainbow {
            config.colors = ColorMode::Rainbow;
        } else if config.effect != Effect::Off {
            let color = required_color(matches, "color");
            config.colors = match cli_from_str(matches, "second-color") {
                Some(Ok(second)) => ColorMode::Dual(color, second),
                Some(Err(err)) => {
                    eprintln!("\x1b[31mIgnoring second color:\x1b[0m {err}\n");
                    ColorMode::Single(color)
                },
                None => ColorMode::Single(color),
            };
        }

        // Determine if some parameters had to be read from STDIN.
        config.interactive = !matches.contains_id("effect")
            || (!matches.contains_id("color") && !rainbow && config.effect != Effect::Off);

        replace_from_str(&mut config.brightness, matches, "brightness");
        replace_from_str(&mut config.speed, matches, "speed");
        replace_from_str(&mut config.direction, matches, "direction");
        config.slot = matches.get_one::<u8>("slot").copied();

        config
    }

    /// Effect parameters sent to the keyboard.
    fn setup(&self) -> ColorSetup {
        ColorSetup {
            colors: self.colors,
            speed: self.speed,
            brightness: self.brightness.0,
            direction: self.direction,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            interactive: Default::default(),
            brightness: Default::default(),
            direction: Default::default(),
            effect: Default::default(),
            colors: Default::default(),
            slot: Default::default(),
        }
    }
}

impl Display for Config {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Add all required parameters.
        write!(
            f,
            "{} mountain \\\n \
            --effect {:?}",
            crate_name!(),
            self.effect,
        )?;

        if let Some(slot) = self.slot {
            write!(f, " \\\n  --slot {}", slot)?;
        }

        // Omit everything else if effect is `Off`.
        if self.effect == Effect::Off {
            return Ok(());
        }

        match self.colors {
            ColorMode::Single(color) => write!(f, " \\\n  --color {}", color)?,
            ColorMode::Dual(first, second) => {
                write!(f, " \\\n  --color {} \\\n  --second-color {}", first, second)?
            },
            ColorMode::Rainbow => write!(f, " \\\n  --rainbow")?,
        }

        if self.brightness != Brightness::max_value() {
            write!(f, " \\\n  --brightness {}", self.brightness)?;
        }

        // Omit animation config for static colors.
        if !self.effect.is_animated() {
            return Ok(());
        }

        if self.speed != DEFAULT_SPEED {
            write!(f, " \\\n  --speed {}", self.speed)?;
        }

        if self.direction != 0 {
            write!(f, " \\\n  --direction {}", self.direction)?;
        }

        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = cli();
    let result = match cli.subcommand() {
        Some(("msi", matches)) => msi(matches),
        Some(("mountain", matches)) => mountain(matches),
        Some(("mountain-direct", matches)) => mountain_direct(matches),
        Some(("mountain-info", _)) => mountain_info(),
        _ => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("\x1b[31mError:\x1b[0m {err}");
        process::exit(1);
    }
}

/// Report successful hardware changes.
fn applied() -> Result<(), Error> {
    println!("\x1b[32mSuccessfully applied changes.\x1b[0m");
    Ok(())
}

/// Set the MSI RGB header color.
fn msi(matches: &ArgMatches) -> Result<(), Error> {
    let color: Rgb = required_color(matches, "color");
    let port = matches.get_one::<u16>("port").copied().unwrap_or(superio::DEFAULT_PORT);

    let board = match matches.get_one::<String>("board") {
        Some(board) => board.clone(),
        None => dmi::board_name(),
    };
    log::info!("Configuring RGB header of board '{}'", board);

    let sio = DevPort::open(port)?;
    let mut controller = MsiRgb::new(sio, &board);
    controller.set_color(color);

    applied()
}

/// Update the Mountain keyboard effect.
fn mountain(matches: &ArgMatches) -> Result<(), Error> {
    let config = Config::from_cli(matches);

    // Print CLI example to skip manual configuration.
    if config.interactive {
        println!("\x1b[32mConfiguration successful.\x1b[0m\n");
        println!("To reapply this config, you can run the following command:\n\n{}\n", config);
    }

    let api = HidApi::new()?;
    let keyboard = MountainKeyboard::open(&api)?;
    apply_effect(&keyboard, &config);

    applied()
}

/// Fill all keyboard LEDs with a custom color.
fn mountain_direct(matches: &ArgMatches) -> Result<(), Error> {
    let color: Rgb = required_color(matches, "color");
    let leds = matches.get_one::<usize>("leds").copied().unwrap_or_default();

    let mut brightness = Brightness::default();
    replace_from_str(&mut brightness, matches, "brightness");

    let data: Vec<u8> = (0..leds).flat_map(|_| [color.r, color.g, color.b]).collect();

    let api = HidApi::new()?;
    let keyboard = MountainKeyboard::open(&api)?;
    if matches.get_flag("edge") {
        keyboard.send_direct_color_edge(brightness.0, &data);
    } else {
        keyboard.send_direct_color(brightness.0, &data);
    }

    applied()
}

/// Print the connected Mountain keyboard.
fn mountain_info() -> Result<(), Error> {
    let api = HidApi::new()?;
    let keyboard = MountainKeyboard::open(&api)?;

    println!("Location: {}", keyboard.location());
    println!("Serial:   {}", keyboard.serial());

    Ok(())
}

/// Send a config to the keyboard.
fn apply_effect<T: HidTransport>(keyboard: &MountainKeyboard<T>, config: &Config) {
    if let Some(slot) = config.slot {
        keyboard.select_mode(slot);
    }

    let setup = config.setup();
    match config.effect {
        Effect::Off => keyboard.send_off(),
        Effect::Static => keyboard.send_static(&setup),
        Effect::Wave => keyboard.send_wave(&setup),
        Effect::Tornado => keyboard.send_tornado(&setup),
        Effect::Breathing => keyboard.send_breathing(&setup),
        Effect::Matrix => keyboard.send_matrix(&setup),
        Effect::Reactive => keyboard.send_reactive(&setup),
    }

    if let Some(slot) = config.slot {
        keyboard.save_data(slot);
    }
}

/// Get clap CLI parameters.
fn cli() -> ArgMatches {
    let color = Arg::new("color").help("LED color in RGB [0xRRGGBB]").long("color").short('c');

    Command::new(crate_name!())
        .version(crate_version!())
        .author("Christian Duerr <contact@christianduerr.com>")
        .about(crate_description!())
        .subcommand_required(true)
        .subcommand(
            Command::new("msi")
                .about("Set the MSI mainboard RGB header color")
                .arg(color.clone())
                .arg(
                    Arg::new("port")
                        .help("Super I/O index port [default: 0x4e]")
                        .long("port")
                        .value_parser(parse_port),
                )
                .arg(Arg::new("board").help("Override the DMI board name").long("board")),
        )
        .subcommand(
            Command::new("mountain")
                .about("Set the Mountain keyboard effect")
                .arg(color.clone())
                .arg(
                    Arg::new("effect")
                        .help("Lighting effect")
                        .long("effect")
                        .short('e')
                        .ignore_case(true)
                        .value_parser(EnumValueParser::<Effect>::new()),
                )
                .arg(
                    Arg::new("second-color")
                        .help("Second LED color for two color effects [0xRRGGBB]")
                        .long("second-color"),
                )
                .arg(
                    Arg::new("rainbow")
                        .help("Use rainbow colors")
                        .long("rainbow")
                        .action(ArgAction::SetTrue),
                )
                .arg(brightness_arg())
                .arg(
                    Arg::new("speed")
                        .help("Effect speed [possible values: 0..=100]")
                        .long("speed")
                        .short('s'),
                )
                .arg(Arg::new("direction").help("Effect direction").long("direction"))
                .arg(
                    Arg::new("slot")
                        .help("Mode slot to select and store the effect in")
                        .long("slot")
                        .value_parser(value_parser!(u8)),
                ),
        )
        .subcommand(
            Command::new("mountain-direct")
                .about("Set a custom color for every Mountain keyboard LED")
                .arg(color)
                .arg(
                    Arg::new("leds")
                        .help("Number of LEDs")
                        .long("leds")
                        .required(true)
                        .value_parser(value_parser!(usize)),
                )
                .arg(brightness_arg())
                .arg(
                    Arg::new("edge")
                        .help("Target the edge lighting")
                        .long("edge")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("mountain-info").about("Print Mountain keyboard information"))
        .get_matches()
}

fn brightness_arg() -> Arg {
    Arg::new("brightness")
        .help("Brightness [possible values: 0..=100]")
        .long("brightness")
        .short('b')
}

/// Parse a hexadecimal port number.
fn parse_port(s: &str) -> Result<u16, ParseIntError> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// Convert a CLI option from the parameter string.
#[inline]
fn cli_from_str<T>(matches: &ArgMatches, name: &str) -> Option<Result<T, <T as FromStr>::Err>>
where
    T: FromStr,
{
    matches.get_one::<String>(name).map(|value| T::from_str(value))
}

/// Replace config value with the CLI parameter if it is present.
#[inline]
fn replace_from_str<T: FromStr>(option: &mut T, matches: &ArgMatches, name: &str) {
    if let Some(Ok(value)) = cli_from_str(matches, name) {
        *option = value;
    }
}

/// Read a color option from CLI or prompt for STDIN if not present.
fn required_color<T: FromStr>(matches: &ArgMatches, name: &str) -> T {
    match cli_from_str(matches, name) {
        Some(Ok(value)) => return value,
        Some(Err(_)) => eprintln!("\x1b[31mInvalid CLI color parameter.\x1b[0m\n"),
        _ => (),
    }

    loop {
        // Query the user for the option.
        print!("Please select a color (format: 0xRRGGBB):\n > ");
        let _ = io::stdout().flush();

        let input = stdin_nextline();

        match T::from_str(&input) {
            Ok(value) => {
                println!();
                break value;
            },
            Err(_) => eprintln!(
                "\x1b[31mColor '{}' does not match format 0xRRGGBB, please try again.\x1b[0m\n",
                input
            ),
        }
    }
}

/// Read an enum option from CLI or prompt for STDIN if not present.
fn required_enum<'a, T>(matches: &'a ArgMatches, name: &str) -> &'a T
where
    T: ValueEnum + Debug + Copy + Sync + Send + 'static,
{
    if let Some(value) = matches.get_one::<T>(name) {
        return value;
    }

    loop {
        // Offer all available variants.
        println!("[{}] Please select a number:", name);
        let variants = T::value_variants();
        for (i, variant) in variants.iter().enumerate() {
            println!("  [{}] {:?}", i, variant);
        }
        print!(" > ");
        let _ = io::stdout().flush();

        let input = stdin_nextline();

        match usize::from_str(&input).ok().and_then(|index| variants.get(index)) {
            Some(variant) => {
                println!();
                return variant;
            },
            // Query again if the variant is not valid.
            _ => println!("\x1b[31mVariant '{}' does not exist, please try again.\x1b[0m\n", input),
        }
    }
}

/// Read next line from STDIN.
#[inline]
fn stdin_nextline() -> String {
    let mut input = String::new();

    let _ = io::stdin().read_line(&mut input);
    input = input.trim().to_string();

    input
}
