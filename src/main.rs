// ============================================================================
// main.rs — Myxelia
// Entry point. Parses the command line, then either runs the headless batch
// runner or starts the interactive viewer event loop.
// ============================================================================

use myxelia::app::{App, AppConfig};
use myxelia::engine::Backend;
use myxelia::grid::ceil_power_of_two;
use myxelia::headless::{self, HeadlessConfig};
use winit::event_loop::EventLoop;

const USAGE: &str = "\
myxelia — multi-species Physarum simulation

USAGE:
    myxelia [OPTIONS]

OPTIONS:
    --headless           Run without a window, exit after --ticks
    --ticks N            Headless tick count [default: 10000]
    --grid WxH           Grid size, rounded up to powers of two [default: 512x512]
    --backend cpu|gpu    Force a backend (default: probe gpu, fall back to cpu)
    --seed N             Seed for spawning and steering noise (default: random)
    --speed N            Initial speed setting, 0-99 [default: 80]
    --config PATH        JSON file with simulation parameters
    --out PATH           Headless only: write the final frame as a PNG
                         (active config lands beside it as .json)
    --help               Print this help
";

struct CliArgs {
    headless: bool,
    ticks: u64,
    width: u32,
    height: u32,
    backend: Option<Backend>,
    seed: Option<u64>,
    speed: u32,
    config_path: Option<String>,
    out: Option<String>,
}

fn fail(msg: &str) -> ! {
    eprintln!("error: {msg}\n\n{USAGE}");
    std::process::exit(1);
}

fn value<'a>(argv: &'a [String], i: usize, flag: &str) -> &'a str {
    match argv.get(i) {
        Some(v) => v,
        None => fail(&format!("{flag} needs a value")),
    }
}

fn number<T: std::str::FromStr>(v: &str, flag: &str) -> T {
    v.parse()
        .unwrap_or_else(|_| fail(&format!("{flag} expects a number, got '{v}'")))
}

fn parse_args() -> CliArgs {
    let mut args = CliArgs {
        headless: false,
        ticks: 10_000,
        width: 512,
        height: 512,
        backend: None,
        seed: None,
        speed: 80,
        config_path: None,
        out: None,
    };

    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--headless" => args.headless = true,
            "--ticks" => {
                i += 1;
                args.ticks = number(value(&argv, i, "--ticks"), "--ticks");
            }
            "--grid" => {
                i += 1;
                let v = value(&argv, i, "--grid");
                let Some((w, h)) = v.split_once('x') else {
                    fail("--grid expects WxH, e.g. 512x512");
                };
                let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>()) else {
                    fail("--grid expects WxH, e.g. 512x512");
                };
                if w == 0 || h == 0 {
                    fail("--grid dimensions must be positive");
                }
                args.width = ceil_power_of_two(w);
                args.height = ceil_power_of_two(h);
            }
            "--backend" => {
                i += 1;
                args.backend = match value(&argv, i, "--backend") {
                    "cpu" => Some(Backend::Cpu),
                    "gpu" => Some(Backend::Gpu),
                    other => fail(&format!("unknown backend '{other}' (expected cpu or gpu)")),
                };
            }
            "--seed" => {
                i += 1;
                args.seed = Some(number(value(&argv, i, "--seed"), "--seed"));
            }
            "--speed" => {
                i += 1;
                args.speed = number::<u32>(value(&argv, i, "--speed"), "--speed").min(99);
            }
            "--config" => {
                i += 1;
                args.config_path = Some(value(&argv, i, "--config").to_string());
            }
            "--out" => {
                i += 1;
                args.out = Some(value(&argv, i, "--out").to_string());
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => fail(&format!("unknown option '{other}'")),
        }
        i += 1;
    }

    args
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    let seed = args.seed.unwrap_or_else(rand::random);

    if args.headless {
        let config = HeadlessConfig {
            ticks: args.ticks,
            width: args.width,
            height: args.height,
            backend: args.backend,
            seed,
            config_path: args.config_path,
            out: args.out,
            ..Default::default()
        };
        if let Err(err) = headless::run(&config) {
            log::error!("headless run failed: {err}");
            std::process::exit(1);
        }
        return;
    }

    let app_config = AppConfig {
        grid_width: args.width,
        grid_height: args.height,
        backend: args.backend,
        seed,
        speed: args.speed,
        config_path: args.config_path,
        ..Default::default()
    };

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = App::new(app_config);
    event_loop.run_app(&mut app).unwrap();
}
