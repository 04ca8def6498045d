#[macro_use]
extern crate log;

pub mod generator;

use std::time::{Duration, Instant};
use clap::{Arg, Command};
use quic_entropy::{ReceivedEntropyTracker, SentEntropyManager};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use generator::LoadGenerator;

enum Outcome {
    /// An honest ACK was accepted.
    Accepted,
    /// A lying ACK was rejected.
    Detected,
    /// A lying ACK guessed the right entropy and was accepted.
    Undetected,
}

/// Send every packet from the generator, then validate the peer's ACK.
fn run_trial(g: &mut LoadGenerator, clear_every: u64) -> Result<(Outcome, Duration), ()> {
    let mut sender = SentEntropyManager::new();
    let mut receiver = ReceivedEntropyTracker::new();

    let t1 = Instant::now();
    while let Some(packet) = g.next() {
        sender.record_packet_entropy_hash(packet.sequence_number, packet.entropy_hash);
        if !packet.dropped {
            receiver.record_packet_entropy_hash(packet.sequence_number, packet.entropy_hash);
        }
        if clear_every > 0 && packet.sequence_number % clear_every == 0 {
            sender.clear_entropy_before(receiver.first_gap());
        }
    }
    let t2 = Instant::now();
    debug!(
        "dropped {}/{} packets, {} entropy records retained: {:?}",
        g.num_dropped,
        g.num_sent,
        sender.len(),
        t2 - t1,
    );

    let mut ack = receiver.ack_info();
    if let Some(lied_about) = g.lied_about {
        let guess = g.guess_entropy_hash(lied_about);
        ack.ack(lied_about, guess);
    }
    match ack.to_bytes() {
        Ok(bytes) => info!("ack size = {} bytes", bytes.len()),
        Err(e) => {
            error!("failed to encode ack: {}", e);
            return Err(());
        }
    }

    let t1 = Instant::now();
    let valid = sender.validate_ack(&ack);
    let total = Instant::now() - t1;
    let outcome = match (g.lied_about.is_some(), valid) {
        (false, true) => Outcome::Accepted,
        (false, false) => {
            error!("honest ack rejected");
            return Err(());
        }
        (true, false) => Outcome::Detected,
        (true, true) => Outcome::Undetected,
    };
    info!("ack valid = {}: {:?}", valid, total);
    Ok((outcome, total))
}

fn median(mut results: Vec<Duration>) -> Option<Duration> {
    if results.is_empty() {
        return None;
    }
    results.sort();
    let mid = results.len() / 2;
    if results.len() & 1 == 0 {
        Some((results[mid - 1] + results[mid]) / 2)
    } else {
        Some(results[mid])
    }
}

fn main() {
    env_logger::builder().filter_level(log::LevelFilter::Info).parse_default_env().init();
    let matches = Command::new("simulator")
        .about("Sends packets to a lossy peer and validates the entropy of its ACK.")
        .arg(Arg::new("num-sent")
            .help("Number of sent packets.")
            .short('n')
            .long("num-sent")
            .takes_value(true)
            .default_value("10000"))
        .arg(Arg::new("p-dropped")
            .help("Probability that a sent packet is dropped.")
            .short('p')
            .long("p-dropped")
            .takes_value(true)
            .default_value("0.005"))
        .arg(Arg::new("malicious")
            .help("Whether the peer acknowledges a packet it never \
                received. The packet is randomly selected, definitely \
                dropped, and the peer guesses its entropy.")
            .long("malicious"))
        .arg(Arg::new("payload-len")
            .help("Number of random payload bytes per packet.")
            .long("payload-len")
            .takes_value(true)
            .default_value("16"))
        .arg(Arg::new("clear-every")
            .help("Clear the sender's entropy history below the peer's \
                first missing packet every this many packets. 0 never \
                clears.")
            .long("clear-every")
            .takes_value(true)
            .default_value("0"))
        .arg(Arg::new("seed")
            .help("Seed for the packet generator. Trial i uses seed + i. \
                Random if not set.")
            .long("seed")
            .takes_value(true))
        .arg(Arg::new("trials")
            .help("Number of trials to run. Reports the median.")
            .long("trials")
            .takes_value(true)
            .default_value("1"))
        .get_matches();

    let num_sent: u64 = matches.value_of_t_or_exit("num-sent");
    let p_dropped: f64 = matches.value_of_t_or_exit("p-dropped");
    let payload_len: usize = matches.value_of_t_or_exit("payload-len");
    let clear_every: u64 = matches.value_of_t_or_exit("clear-every");
    let trials: u64 = matches.value_of_t_or_exit("trials");
    let seed: Option<u64> = if matches.is_present("seed") {
        Some(matches.value_of_t_or_exit("seed"))
    } else {
        None
    };
    let malicious = matches.is_present("malicious");
    if num_sent < 2 {
        error!("need at least two packets, got {}", num_sent);
        return;
    }
    if !(0.0..=1.0).contains(&p_dropped) {
        error!("p-dropped must be between 0 and 1, got {}", p_dropped);
        return;
    }
    debug!("num_sent = {}", num_sent);
    debug!("p_dropped = {}", p_dropped);
    debug!("malicious = {}", malicious);
    debug!("clear_every = {}", clear_every);

    let mut results = vec![];
    let mut errors = 0;
    let mut detected = 0;
    let mut undetected = 0;
    for trial in 0..trials {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(trial)),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut g = LoadGenerator::new(rng, num_sent, p_dropped, payload_len, malicious);
        match run_trial(&mut g, clear_every) {
            Ok((outcome, duration)) => {
                match outcome {
                    Outcome::Accepted => {}
                    Outcome::Detected => detected += 1,
                    Outcome::Undetected => undetected += 1,
                }
                results.push(duration);
            }
            Err(()) => errors += 1,
        }
    }
    if malicious {
        info!("detected {}/{} lying acks", detected, detected + undetected);
    }
    info!("errors\tsent\tp_drop\tmedian");
    info!("{}\t{}\t{}\t{:?}", errors, num_sent, p_dropped, median(results));
}
