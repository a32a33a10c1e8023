use std::env;
use std::fs;
use std::path::Path;
use std::process;

use lyric_sync::host::SystemHost;
use lyric_sync::player::WordActivation;
use lyric_sync::{
    parse_lyric, LyricError, LyricLine, LyricPlayer, LyricSource, PlaybackState, PlayerConfig,
    PlayerEvents,
};

const USAGE: &str = "Usage: lyric-sync [--config <player.yaml>] [--play [--from <ms>]] <source.yaml>";

/// Prints activations as they happen
struct PrintEvents;

impl PlayerEvents for PrintEvents {
    fn on_line_play(&mut self, index: usize, line: &LyricLine) {
        match &line.translated {
            Some(translated) => println!("[{:>4}] {} / {}", index, line.original, translated),
            None => println!("[{:>4}] {}", index, line.original),
        }
    }

    fn on_word_play(&mut self, activation: &WordActivation<'_>) {
        if activation.duration > 0.0 {
            println!("       {}", activation.word.text.trim_end());
        }
    }
}

fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

fn read(path: &str) -> Result<String, LyricError> {
    fs::read_to_string(path).map_err(|source| LyricError::Io {
        path: Path::new(path).to_path_buf(),
        source,
    })
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn main() {
    init_subscriber("warn");

    let args: Vec<String> = env::args().skip(1).collect();
    let mut play = false;
    let mut from = 0.0;
    let mut config_path: Option<&String> = None;
    let mut input_path: Option<&String> = None;

    // Parse flags
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--play" => play = true,
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(path),
                    None => usage_error("--config needs a path"),
                }
            }
            "--from" => {
                i += 1;
                from = match args.get(i).map(|v| v.parse::<f64>()) {
                    Some(Ok(ms)) => ms,
                    _ => usage_error("--from needs a time in ms"),
                };
            }
            _ if input_path.is_none() => input_path = Some(&args[i]),
            other => usage_error(&format!("Unexpected argument '{}'", other)),
        }
        i += 1;
    }

    let Some(input_path) = input_path else {
        usage_error("Missing lyric source");
    };

    let config = config_path.map(|p| read(p).and_then(|c| PlayerConfig::from_yaml_str(&c)));
    let config = match config {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        None => PlayerConfig::default(),
    };

    let source = match read(input_path).and_then(|c| LyricSource::from_yaml_str(&c)) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let model = parse_lyric(&source);

    if !play {
        match serde_json::to_string_pretty(&model) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing lyric: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let mut player = LyricPlayer::new(SystemHost::new(), PrintEvents, model, config);
    player.play(from);
    while player.state() == PlaybackState::Playing {
        match player.host_mut().wait_next() {
            Some(id) => player.wake(id),
            None => break,
        }
    }
}
