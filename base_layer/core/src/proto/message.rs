// Copyright 2022. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The wire codec shared with the network collaborator: length-prefixed, version-tagged frames
//! around a canonical borsh payload. The codec is byte-exact; every message round-trips.

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::{
    chain_index::{BrokerInfo, ChainIndex},
    epoch_time::EpochTime,
    types::{BlockHash, FixedHash, TxId},
};
use thiserror::Error;

use crate::{blocks::Block, transactions::Transaction};

pub const WIRE_VERSION: u8 = 1;

/// Sending a frame with the wrong wire version is peer misbehavior, not a decode bug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Wrong wire version: expected {expected}, got {actual}")]
    WrongVersion { expected: u8, actual: u8 },
    #[error("Frame is truncated")]
    Truncated,
    #[error("Frame length prefix does not match the payload")]
    LengthMismatch,
    #[error("Malformed payload: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Payload {
    Hello {
        broker_info: BrokerInfo,
        clique_id: FixedHash,
    },
    Ping {
        request_id: u64,
        timestamp: EpochTime,
    },
    Pong {
        request_id: u64,
        timestamp: EpochTime,
    },
    NewBlock(Box<Block>),
    NewBlockHash(BlockHash),
    GetBlocks {
        chain_index: ChainIndex,
        locators: Vec<BlockHash>,
    },
    Blocks(Vec<Block>),
    NewTxHashes(Vec<TxId>),
    GetTxs(Vec<TxId>),
    Txs(Vec<Transaction>),
}

/// `[u32 big-endian length of (version + payload)] [version byte] [borsh payload]`
pub fn encode_frame(payload: &Payload) -> Result<Vec<u8>, WireError> {
    let body = borsh::to_vec(payload).map_err(|e| WireError::Decode(e.to_string()))?;
    let mut frame = Vec::with_capacity(5 + body.len());
    frame.extend_from_slice(&((body.len() + 1) as u32).to_be_bytes());
    frame.push(WIRE_VERSION);
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_frame(frame: &[u8]) -> Result<Payload, WireError> {
    if frame.len() < 5 {
        return Err(WireError::Truncated);
    }
    let declared = u32::from_be_bytes(frame[..4].try_into().expect("4 bytes")) as usize;
    if frame.len() - 4 != declared {
        return Err(WireError::LengthMismatch);
    }
    let version = frame[4];
    if version != WIRE_VERSION {
        return Err(WireError::WrongVersion {
            expected: WIRE_VERSION,
            actual: version,
        });
    }
    let mut body = &frame[5..];
    let payload = Payload::deserialize(&mut body).map_err(|e| WireError::Decode(e.to_string()))?;
    if !body.is_empty() {
        return Err(WireError::LengthMismatch);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::types::U256;

    use super::*;
    use crate::{
        blocks::{BlockDeps, BlockHeader},
        proof_of_work::Target,
    };

    fn sample_block() -> Block {
        Block::new(
            BlockHeader {
                deps: BlockDeps::genesis(2),
                dep_state_hash: FixedHash::zero(),
                txs_hash: FixedHash::zero(),
                timestamp: EpochTime::from_millis(17),
                target: Target(U256::MAX >> 4),
                nonce: 3,
            },
            vec![],
        )
    }

    #[test]
    fn every_payload_round_trips_byte_exact() {
        let payloads = vec![
            Payload::Hello {
                broker_info: BrokerInfo {
                    broker_id: 0,
                    broker_num: 2,
                    groups: 4,
                },
                clique_id: FixedHash::from([8u8; 32]),
            },
            Payload::Ping {
                request_id: 42,
                timestamp: EpochTime::from_millis(1000),
            },
            Payload::Pong {
                request_id: 42,
                timestamp: EpochTime::from_millis(1001),
            },
            Payload::NewBlock(Box::new(sample_block())),
            Payload::NewBlockHash(FixedHash::from([2u8; 32])),
            Payload::GetBlocks {
                chain_index: ChainIndex::unchecked(1, 2),
                locators: vec![FixedHash::from([3u8; 32])],
            },
            Payload::Blocks(vec![sample_block()]),
            Payload::NewTxHashes(vec![FixedHash::from([4u8; 32])]),
            Payload::GetTxs(vec![FixedHash::from([5u8; 32])]),
            Payload::Txs(vec![]),
        ];
        for payload in payloads {
            let frame = encode_frame(&payload).unwrap();
            let decoded = decode_frame(&frame).unwrap();
            assert_eq!(decoded, payload);
            // Byte-exact: re-encoding yields the identical frame
            assert_eq!(encode_frame(&decoded).unwrap(), frame);
        }
    }

    #[test]
    fn wrong_version_is_misbehavior() {
        let mut frame = encode_frame(&Payload::Ping {
            request_id: 1,
            timestamp: EpochTime::from_millis(1),
        })
        .unwrap();
        frame[4] = WIRE_VERSION + 1;
        assert_eq!(
            decode_frame(&frame),
            Err(WireError::WrongVersion {
                expected: WIRE_VERSION,
                actual: WIRE_VERSION + 1
            })
        );
    }

    #[test]
    fn corrupt_frames_are_rejected() {
        let frame = encode_frame(&Payload::NewBlockHash(FixedHash::zero())).unwrap();
        assert_eq!(decode_frame(&frame[..3]), Err(WireError::Truncated));

        let mut bad_length = frame.clone();
        bad_length[3] ^= 0x01;
        assert_eq!(decode_frame(&bad_length), Err(WireError::LengthMismatch));

        let mut trailing = frame;
        trailing.push(0);
        assert_eq!(decode_frame(&trailing), Err(WireError::LengthMismatch));
    }
}
