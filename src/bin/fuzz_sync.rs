//! AFL fuzz harness for document sync
//!
//! Properties checked:
//! 1. Decoding arbitrary bytes never panics, and a failed apply leaves the
//!    document untouched.
//! 2. Replicas that exchange all their updates converge, whatever order
//!    the updates arrive in.
//!
//! Model: each user owns a replica, edits locally and sends diffs to other
//! users based on the receiver's state vector.

use afl::fuzz;
use tandem::Doc;
use tandem::ReadTxn;

const NUM_USERS: usize = 3;

/// Operation types the fuzzer can generate
#[derive(Debug, Clone, Copy)]
enum FuzzOp {
    /// User inserts text at a position in their replica
    Insert { user: u8, pos_frac: u8, len: u8 },
    /// User deletes text from their replica
    Delete { user: u8, pos_frac: u8, len: u8 },
    /// User writes a map key
    SetKey { user: u8, key: u8, value: u8 },
    /// User B receives what it is missing from user A
    Send { from: u8, to: u8 },
    /// A bystander receives a corrupted copy of a diff
    Corrupt { from: u8, to: u8, at: u8, byte: u8 },
}

impl FuzzOp {
    fn from_bytes(bytes: &[u8]) -> Option<(FuzzOp, &[u8])> {
        if bytes.is_empty() {
            return None;
        }

        let op_type = bytes[0] % 5;
        let rest = &bytes[1..];

        match op_type {
            0 if rest.len() >= 3 => {
                let op = FuzzOp::Insert {
                    user: rest[0] % NUM_USERS as u8,
                    pos_frac: rest[1],
                    len: (rest[2] % 16).saturating_add(1),
                };
                return Some((op, &rest[3..]));
            }
            1 if rest.len() >= 3 => {
                let op = FuzzOp::Delete {
                    user: rest[0] % NUM_USERS as u8,
                    pos_frac: rest[1],
                    len: (rest[2] % 8).saturating_add(1),
                };
                return Some((op, &rest[3..]));
            }
            2 if rest.len() >= 3 => {
                let op = FuzzOp::SetKey {
                    user: rest[0] % NUM_USERS as u8,
                    key: rest[1] % 4,
                    value: rest[2],
                };
                return Some((op, &rest[3..]));
            }
            3 if rest.len() >= 2 => {
                let op = FuzzOp::Send {
                    from: rest[0] % NUM_USERS as u8,
                    to: rest[1] % NUM_USERS as u8,
                };
                return Some((op, &rest[2..]));
            }
            4 if rest.len() >= 4 => {
                let op = FuzzOp::Corrupt {
                    from: rest[0] % NUM_USERS as u8,
                    to: rest[1] % NUM_USERS as u8,
                    at: rest[2],
                    byte: rest[3],
                };
                return Some((op, &rest[4..]));
            }
            _ => return None,
        }
    }
}

fn send(replicas: &mut [Doc], from: usize, to: usize) {
    let update = replicas[from].encode_diff(&replicas[to].state_vector());
    replicas[to]
        .apply_update(&update)
        .expect("well-formed diff rejected");
}

fn observe(doc: &mut Doc) -> (String, String, Vec<u8>) {
    let text = doc.get_or_insert_text("t").expect("text root");
    let map = doc.get_or_insert_map("m").expect("map root");
    let entries = format!("{:?}", map.to_map(&*doc));
    return (text.get_string(&*doc), entries, doc.encode_state_vector());
}

fn main() {
    fuzz!(|data: &[u8]| {
        // Any input is also tried as a raw update.
        let mut raw = Doc::with_replica_id(100);
        let before = raw.encode_state_vector();
        if raw.apply_update(data).is_err() {
            assert_eq!(raw.encode_state_vector(), before, "failed apply changed state");
        }

        let mut replicas: Vec<Doc> = (1..=NUM_USERS as u64).map(Doc::with_replica_id).collect();
        let mut remaining = data;

        while let Some((op, rest)) = FuzzOp::from_bytes(remaining) {
            remaining = rest;

            match op {
                FuzzOp::Insert { user, pos_frac, len } => {
                    let doc = &mut replicas[user as usize];
                    let text = doc.get_or_insert_text("t").expect("text root");
                    let mut txn = doc.transact();
                    let doc_len = text.len(&txn);
                    let pos = ((pos_frac as u32) * doc_len / 256).min(doc_len);
                    let content: String = (0..len)
                        .map(|i| (b'A' + user.wrapping_add(i) % 26) as char)
                        .collect();
                    text.insert(&mut txn, pos, &content).expect("insert in range");
                    txn.commit();
                }

                FuzzOp::Delete { user, pos_frac, len } => {
                    let doc = &mut replicas[user as usize];
                    let text = doc.get_or_insert_text("t").expect("text root");
                    let mut txn = doc.transact();
                    let doc_len = text.len(&txn);
                    if doc_len > 0 {
                        let pos = ((pos_frac as u32) * doc_len / 256).min(doc_len - 1);
                        let del_len = (len as u32).min(doc_len - pos);
                        text.remove_range(&mut txn, pos, del_len).expect("remove in range");
                    }
                    txn.commit();
                }

                FuzzOp::SetKey { user, key, value } => {
                    let doc = &mut replicas[user as usize];
                    let map = doc.get_or_insert_map("m").expect("map root");
                    let mut txn = doc.transact();
                    map.insert(&mut txn, &key.to_string(), value as i64).expect("map insert");
                    txn.commit();
                }

                FuzzOp::Send { from, to } => {
                    if from != to {
                        send(&mut replicas, from as usize, to as usize);
                    }
                }

                FuzzOp::Corrupt { from, to, at, byte } => {
                    if from == to {
                        continue;
                    }
                    let mut update =
                        replicas[from as usize].encode_diff(&replicas[to as usize].state_vector());
                    let index = at as usize % update.len();
                    update[index] = byte;
                    // Forged blocks would break convergence, so the users never see them.
                    let mut bystander = Doc::with_replica_id(200);
                    if bystander.apply_update(&update).is_err() {
                        assert!(bystander.state_vector().is_empty(), "failed apply changed state");
                    }
                }
            }
        }

        // Full mesh, twice so every replica sees everything.
        for _ in 0..2 {
            for i in 0..NUM_USERS {
                for j in 0..NUM_USERS {
                    if i != j {
                        send(&mut replicas, j, i);
                    }
                }
            }
        }

        let first = observe(&mut replicas[0]);
        for (i, doc) in replicas.iter_mut().enumerate().skip(1) {
            assert_eq!(observe(doc), first, "Convergence failure! User {} != User 0", i);
        }
    });
}
