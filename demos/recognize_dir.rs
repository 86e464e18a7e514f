use std::error::Error;
use std::env::args;
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use platescan::{Config, Lpr, Models};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let mut args = args();
    args.next();
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("didn't get a directory from args");
            process::exit(1);
        }
    };
    let models = Models::load("./models/judge.json", "./models/classifier.json")?;
    let lpr = Lpr::new(Config::default(), Arc::new(models))?;

    let mut speeds = Vec::new();
    let mut scores = Vec::new();
    let mut total_amount = 0;
    for entry in fs::read_dir(path)?.flatten() {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"));
        if !is_image {
            continue;
        }

        let start = Instant::now();
        let img = image::open(&path)?;
        let res = lpr.recognize(&img)?;
        let speed = start.elapsed().as_millis();
        total_amount += 1;
        speeds.push(speed);
        if let Some(best) = res.first() {
            scores.push(best.confidence);
        }
        let texts: Vec<&str> = res.iter().map(|r| r.text.as_str()).collect();
        println!("file: {:?}, res: {:?}, speed: {}ms", path, texts, speed);
    }

    let success = scores.len();
    let average_score = if success > 0 { scores.iter().sum::<f32>() / success as f32 } else { 0.0 };
    let average_speed = if total_amount > 0 { speeds.iter().sum::<u128>() / total_amount as u128 } else { 0 };
    println!(
        "total_amount: {}, success: {}, average_confidence: {}, average_speed: {}ms",
        total_amount, success, average_score, average_speed
    );
    Ok(())
}
