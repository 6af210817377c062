//! Racing transitions on a shared program.

use std::sync::{Arc, Barrier};
use std::thread;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use safepay_ledger::Authority;
use safepay_program::InMemoryEscrowProgram;
use safepay_types::*;

const AMOUNT: u64 = 20_000_000;

struct Parties {
    mint: Pubkey,
    sender: VerifiedSigner,
    receiver: VerifiedSigner,
    sender_ata: Pubkey,
    receiver_ata: Pubkey,
}

fn setup(program: &InMemoryEscrowProgram) -> Parties {
    let issuer = VerifiedSigner::from_signing_key(&SigningKey::generate(&mut OsRng));
    let sender = VerifiedSigner::from_signing_key(&SigningKey::generate(&mut OsRng));
    let receiver = VerifiedSigner::from_signing_key(&SigningKey::generate(&mut OsRng));
    let mint = Pubkey::new_unique();
    let (sender_ata, receiver_ata) = program
        .with_ledger(|ledger| {
            ledger.create_mint(mint, issuer.key())?;
            let s = ledger.create_associated_account(sender.key(), mint)?;
            let r = ledger.create_associated_account(receiver.key(), mint)?;
            ledger.mint_to(Authority::Signer(&issuer), &mint, &s, AMOUNT)?;
            ledger.airdrop(sender.key(), 1_000_000_000)?;
            Ok((s, r))
        })
        .expect("ledger setup");
    Parties {
        mint,
        sender,
        receiver,
        sender_ata,
        receiver_ata,
    }
}

#[test]
fn racing_reclaim_and_settle_close_once() {
    let program = Arc::new(InMemoryEscrowProgram::in_memory(ProgramConfig::default()).unwrap());

    for _ in 0..16 {
        let p = setup(&program);
        let opened = program
            .initiate(&p.sender, p.receiver.key(), p.mint, AMOUNT, p.sender_ata)
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let reclaim = {
            let (program, barrier) = (Arc::clone(&program), Arc::clone(&barrier));
            let (signer, record, dest) = (p.sender, opened.record, p.sender_ata);
            thread::spawn(move || {
                barrier.wait();
                program.reclaim(&signer, record, dest)
            })
        };
        let settle = {
            let (program, barrier) = (Arc::clone(&program), Arc::clone(&barrier));
            let (signer, record, dest) = (p.receiver, opened.record, p.receiver_ata);
            thread::spawn(move || {
                barrier.wait();
                program.settle(&signer, record, dest)
            })
        };
        let results = [reclaim.join().unwrap(), settle.join().unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one close must commit: {results:?}");
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(*loser, SafepayError::AlreadyClosed(opened.record));

        let (sender_bal, receiver_bal) = program
            .with_ledger(|ledger| {
                Ok((
                    ledger.token_account(&p.sender_ata)?.amount,
                    ledger.token_account(&p.receiver_ata)?.amount,
                ))
            })
            .unwrap();
        assert_eq!(sender_bal + receiver_bal, AMOUNT);
        assert!(sender_bal == 0 || receiver_bal == 0);
        assert!(
            program
                .with_ledger(|ledger| ledger.verify_supply(&p.mint))
                .is_ok()
        );
    }
}

#[test]
fn racing_initiates_open_once() {
    let program = Arc::new(InMemoryEscrowProgram::in_memory(ProgramConfig::default()).unwrap());
    let p = setup(&program);
    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (program, barrier) = (Arc::clone(&program), Arc::clone(&barrier));
            let (sender, receiver, mint, source) =
                (p.sender, p.receiver.key(), p.mint, p.sender_ata);
            thread::spawn(move || {
                barrier.wait();
                program.initiate(&sender, receiver, mint, AMOUNT / 4, source)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, SafepayError::RecordAlreadyExists(_)))
    );
    let left = program
        .with_ledger(|ledger| ledger.token_account(&p.sender_ata))
        .unwrap()
        .amount;
    assert_eq!(left, AMOUNT - AMOUNT / 4);
}
