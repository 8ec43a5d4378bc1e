//! Concurrent access tests
//!
//! These tests verify that balances, registrations and OTP state stay
//! consistent when many threads hit the same bank at once.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture
//! Run specific test: cargo test --test concurrent_access_test test_name -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Instant;

use tempfile::TempDir;

use hwbank_core::adapters::clock::ManualClock;
use hwbank_core::adapters::duckdb::DuckDbRepository;
use hwbank_core::config::Config;
use hwbank_core::domain::{AccountProfile, Argon2Params};
use hwbank_core::ports::{EmailMessage, EmailSender};
use hwbank_core::services::{EntryPoint, LoggingService};
use hwbank_core::{BankContext, Error, OtpVerification, RegistrationRequest, TransferRequest};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 10;

#[derive(Default)]
struct CapturingSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl EmailSender for CapturingSender {
    fn name(&self) -> &str {
        "capturing"
    }

    fn send(&self, message: &EmailMessage) -> hwbank_core::domain::result::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn create_bank(temp_dir: &TempDir) -> (Arc<BankContext>, Arc<CapturingSender>) {
    let repo = DuckDbRepository::new(&temp_dir.path().join("bank.duckdb")).unwrap();
    repo.ensure_schema().unwrap();

    let mut config = Config::default();
    config.credentials = Argon2Params {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    let email = Arc::new(CapturingSender::default());
    let ctx = BankContext::with_components(
        config,
        Arc::new(repo),
        email.clone(),
        Arc::new(ManualClock::default()),
        Arc::new(LoggingService::in_memory(EntryPoint::Service, "test").unwrap()),
    );
    (Arc::new(ctx), email)
}

fn registration(username: &str) -> RegistrationRequest {
    RegistrationRequest {
        profile: AccountProfile {
            email: format!("{}@example.com", username),
            ..Default::default()
        },
        username: username.to_string(),
        password: "pw".to_string(),
        confirm_password: "pw".to_string(),
        terms_accepted: true,
    }
}

/// Test: many threads draining one account at the same time
///
/// 10 transfers of 3000 against a balance of 20000: exactly 6 fit, the
/// rest must fail with InsufficientFunds and no balance may go negative.
#[test]
fn test_concurrent_transfers_never_overdraw() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = create_bank(&temp_dir);

    ctx.account_service.register(&registration("alice")).unwrap();
    let bob = ctx.account_service.register(&registration("bob")).unwrap();
    let session = ctx.auth_service.open_session().unwrap();
    let principal = ctx.auth_service.login(&session, "alice", "pw").unwrap();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let insufficient_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let principal = principal.clone();
        let destination = bob.account_number.to_string();
        let success_count = Arc::clone(&success_count);
        let insufficient_count = Arc::clone(&insufficient_count);

        handles.push(thread::spawn(move || {
            barrier.wait();
            let start = Instant::now();

            let result = ctx.transfer_service.transfer(
                &principal,
                &TransferRequest {
                    destination,
                    amount: 3000,
                    password: "pw".to_string(),
                },
            );
            match result {
                Ok(_) => {
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(Error::InsufficientFunds { .. }) => {
                    insufficient_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("Thread {}: unexpected error: {}", thread_id, e),
            }
            println!("Thread {}: finished in {:?}", thread_id, start.elapsed());
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(success_count.load(Ordering::SeqCst), 6);
    assert_eq!(insufficient_count.load(Ordering::SeqCst), 4);

    let alice = ctx.repository.find_by_username("alice").unwrap().unwrap();
    let bob = ctx.repository.find_by_username("bob").unwrap().unwrap();
    assert_eq!(alice.balance, 2000);
    assert_eq!(bob.balance, 38000);
    assert_eq!(ctx.repository.get_transfer_count().unwrap(), 6);
    assert_eq!(ctx.repository.get_total_balance().unwrap(), 40000);
}

/// Test: transfers flowing both ways between the same pair of accounts
#[test]
fn test_bidirectional_transfers_conserve_money() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = create_bank(&temp_dir);

    let alice = ctx.account_service.register(&registration("alice")).unwrap();
    let bob = ctx.account_service.register(&registration("bob")).unwrap();
    let alice_p = {
        let s = ctx.auth_service.open_session().unwrap();
        ctx.auth_service.login(&s, "alice", "pw").unwrap()
    };
    let bob_p = {
        let s = ctx.auth_service.open_session().unwrap();
        ctx.auth_service.login(&s, "bob", "pw").unwrap()
    };

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];
    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let (principal, destination) = if thread_id % 2 == 0 {
            (alice_p.clone(), bob.account_number.to_string())
        } else {
            (bob_p.clone(), alice.account_number.to_string())
        };

        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..5 {
                let request = TransferRequest {
                    destination: destination.clone(),
                    amount: 700 + (i * 300) as i64,
                    password: "pw".to_string(),
                };
                match ctx.transfer_service.transfer(&principal, &request) {
                    Ok(_) | Err(Error::InsufficientFunds { .. }) => {}
                    Err(e) => panic!("Thread {}: unexpected error: {}", thread_id, e),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ctx.repository.get_total_balance().unwrap(), 40000);
    let doctor = ctx.doctor_service.run_checks().unwrap();
    assert_eq!(doctor.summary.errors, 0);
    assert_eq!(doctor.summary.warnings, 0);
}

/// Test: the same username registered from many threads at once
#[test]
fn test_concurrent_registration_keeps_usernames_unique() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = create_bank(&temp_dir);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let created = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let created = Arc::clone(&created);
        let conflicts = Arc::clone(&conflicts);

        handles.push(thread::spawn(move || {
            barrier.wait();
            // Half the threads race on one name, the rest use their own
            let username = if thread_id % 2 == 0 {
                "contested".to_string()
            } else {
                format!("user{}", thread_id)
            };
            match ctx.account_service.register(&registration(&username)) {
                Ok(_) => {
                    created.fetch_add(1, Ordering::SeqCst);
                }
                Err(Error::Conflict(_)) => {
                    conflicts.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("Thread {}: unexpected error: {}", thread_id, e),
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(created.load(Ordering::SeqCst), THREAD_COUNT / 2 + 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), THREAD_COUNT / 2 - 1);

    let accounts = ctx.repository.get_accounts().unwrap();
    assert_eq!(accounts.len(), THREAD_COUNT / 2 + 1);
    let mut numbers: Vec<_> = accounts.iter().map(|a| a.account_number.clone()).collect();
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), accounts.len());
}

/// Test: one OTP code submitted from many threads in the same session
#[test]
fn test_concurrent_otp_verification_is_single_use() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, email) = create_bank(&temp_dir);
    ctx.account_service.register(&registration("alice")).unwrap();

    let session = ctx.auth_service.open_session().unwrap();
    ctx.password_reset_service
        .request_otp(&session, "alice@example.com")
        .unwrap();
    let code = {
        let sent = email.sent.lock().unwrap();
        sent[0]
            .text
            .split_whitespace()
            .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
            .unwrap()
            .to_string()
    };

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let verified = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];
    for _ in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let verified = Arc::clone(&verified);
        let session = session.clone();
        let code = code.clone();

        handles.push(thread::spawn(move || {
            barrier.wait();
            match ctx.password_reset_service.verify_otp(&session, &code).unwrap() {
                OtpVerification::Verified { .. } => {
                    verified.fetch_add(1, Ordering::SeqCst);
                }
                other => assert_eq!(other, OtpVerification::NoActiveChallenge),
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(verified.load(Ordering::SeqCst), 1);
}
