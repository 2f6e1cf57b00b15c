mod common;

// std
use std::{
	sync::{Arc, Barrier, mpsc},
	thread,
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use common::*;
use oauth2_connect::{connection::Connection, error::Result};

type Log = Arc<Mutex<Vec<String>>>;

#[test]
fn refresh_waits_for_in_flight_call() {
	let log = Log::default();
	let tokens = Arc::new(ScriptedTokenService::with_hook({
		let log = log.clone();

		move |label| log.lock().push(label.to_owned())
	}));
	let connection = Connection::from_grant(
		provider(),
		grant("AT1", Some("RT1"), Some(Duration::hours(1))).with_provider_user_id(user("OPENID")),
		Arc::new(FakeApiFactory::default()),
		tokens.clone(),
	)
	.expect("Connection should build.");

	tokens.push(Ok(grant("AT2", Some("RT2"), Some(Duration::hours(1)))));

	let (entered_tx, entered_rx) = mpsc::channel();
	let caller = {
		let connection = connection.clone();
		let log = log.clone();

		thread::spawn(move || {
			connection.api().invoke(|api| -> Result<String> {
				log.lock().push("call-start".into());
				entered_tx.send(()).expect("Test thread should be listening.");
				thread::sleep(StdDuration::from_millis(150));
				log.lock().push("call-end".into());

				Ok(api.token.clone())
			})
		})
	};

	entered_rx.recv().expect("Call should start.");
	connection.refresh().expect("Refresh should succeed.");

	let seen = caller.join().expect("Caller should not panic.").expect("Call should succeed.");

	assert_eq!(seen, "AT1");
	assert_eq!(log.lock().as_slice(), ["call-start", "call-end", "refresh:RT1"]);
	assert_eq!(connection.credential().access_token.expose(), "AT2");
}

#[test]
fn call_during_refresh_observes_new_client() {
	let (entered_tx, entered_rx) = mpsc::channel::<()>();
	let entered_tx = Mutex::new(entered_tx);
	let log = Log::default();
	let tokens = Arc::new(ScriptedTokenService::with_hook({
		let log = log.clone();

		move |label| {
			log.lock().push(format!("{label}:start"));
			entered_tx.lock().send(()).expect("Test thread should be listening.");
			thread::sleep(StdDuration::from_millis(150));
			log.lock().push(format!("{label}:end"));
		}
	}));
	let connection = Connection::from_grant(
		provider(),
		grant("AT1", Some("RT1"), Some(Duration::seconds(-1))).with_provider_user_id(user("OPENID")),
		Arc::new(FakeApiFactory::default()),
		tokens.clone(),
	)
	.expect("Connection should build.");

	tokens.push(Ok(grant("AT2", Some("RT2"), Some(Duration::hours(1)))));

	let refresher = {
		let connection = connection.clone();

		thread::spawn(move || connection.refresh())
	};

	entered_rx.recv().expect("Refresh should start.");

	let seen = connection
		.api()
		.invoke(|api| -> Result<String> {
			log.lock().push("call".into());

			Ok(api.token.clone())
		})
		.expect("Call after refresh should succeed.");

	refresher.join().expect("Refresher should not panic.").expect("Refresh should succeed.");

	assert_eq!(seen, "AT2");
	assert_eq!(log.lock().as_slice(), ["refresh:RT1:start", "refresh:RT1:end", "call"]);
}

#[test]
fn concurrent_callers_observe_refreshes_in_order() {
	const CALLERS: usize = 8;
	const ROUNDS: usize = 20;

	let tokens = Arc::new(ScriptedTokenService::default());
	let connection = Connection::from_grant(
		provider(),
		grant("AT0", Some("RT0"), Some(Duration::hours(1))).with_provider_user_id(user("OPENID")),
		Arc::new(FakeApiFactory::default()),
		tokens.clone(),
	)
	.expect("Connection should build.");

	for round in 1..=ROUNDS {
		tokens.push(Ok(grant(&format!("AT{round}"), Some(&format!("RT{round}")), Some(Duration::hours(1)))));
	}

	let barrier = Arc::new(Barrier::new(CALLERS + 1));
	let callers = (0..CALLERS)
		.map(|_| {
			let connection = connection.clone();
			let barrier = barrier.clone();

			thread::spawn(move || {
				let mut last = 0;

				barrier.wait();

				for _ in 0..50 {
					let token = connection
						.api()
						.invoke(|api| -> Result<String> { Ok(api.token.clone()) })
						.expect("Valid connection should accept calls.");
					let round = token
						.trim_start_matches("AT")
						.parse::<usize>()
						.expect("Token should carry its round.");

					assert!(round >= last, "Observed AT{round} after AT{last}.");

					last = round;
				}
			})
		})
		.collect::<Vec<_>>();

	barrier.wait();

	for _ in 0..ROUNDS {
		connection.refresh().expect("Scripted refresh should succeed.");
	}
	for caller in callers {
		caller.join().expect("Caller should not panic.");
	}

	let expected = (0..ROUNDS).map(|round| format!("refresh:RT{round}")).collect::<Vec<_>>();

	assert_eq!(*tokens.seen.lock(), expected);
	assert_eq!(connection.credential().access_token.expose(), format!("AT{ROUNDS}"));
	assert_eq!(connection.metrics().attempts(), ROUNDS as u64);
}
