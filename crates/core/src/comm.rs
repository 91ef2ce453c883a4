//! Inter-worker message passing: halo exchange, reductions, and the one-shot
//! descriptor distribution.
//!
//! Workers share nothing; every cross-sub-domain dependency goes through a
//! [`Communicator`]. Each pair of ranks is wired with a dedicated unbounded
//! channel per direction, so messages from different peers can never
//! interleave and the send-all-then-receive-all halo pattern cannot deadlock.
//! All collective operations (halo exchange, reductions, particle transfers)
//! must be reached by every rank in the same program order; a rank that skips
//! one desynchronizes the run, which surfaces as a [`CommError::Protocol`].

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::domain::{Direction, Domain};
use crate::error::CommError;
use crate::matrix::Matrix;
use crate::particle::Particle;

enum Message {
    Domain(Box<Domain>),
    Edge(Vec<f64>),
    Scalar(f64),
    Particles(Vec<Particle>),
}

/// One rank's endpoint of the worker mesh.
pub struct Communicator {
    rank: usize,
    size: usize,
    /// `senders[peer]` carries messages from this rank to `peer`.
    senders: Vec<Sender<Message>>,
    /// `receivers[peer]` carries messages from `peer` to this rank.
    receivers: Vec<Receiver<Message>>,
}

/// Builds the fully-connected channel mesh for a worker group.
pub struct CommHub;

impl CommHub {
    /// Create `size` communicators, one per rank, wired all-to-all.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn create(size: usize) -> Vec<Communicator> {
        assert!(size > 0, "worker group must have at least one rank");
        let mut senders: Vec<Vec<Sender<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = unbounded();
                senders[src].push(tx);
                receivers[dst].push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (s, r))| Communicator {
                rank,
                size,
                senders: s,
                receivers: r,
            })
            .collect()
    }
}

impl Communicator {
    /// This worker's rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the worker group.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this rank drives domain construction and diagnostics.
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    fn send(&self, peer: usize, msg: Message) -> Result<(), CommError> {
        self.senders[peer]
            .send(msg)
            .map_err(|_| CommError::Disconnected { peer })
    }

    fn recv(&self, peer: usize) -> Result<Message, CommError> {
        self.receivers[peer]
            .recv()
            .map_err(|_| CommError::Disconnected { peer })
    }

    /// Coordinator side of the startup broadcast: hand `domain` to `peer`.
    pub fn send_domain(&self, peer: usize, domain: Domain) -> Result<(), CommError> {
        self.send(peer, Message::Domain(Box::new(domain)))
    }

    /// Worker side of the startup broadcast: receive this rank's descriptor
    /// from the coordinator.
    pub fn recv_domain(&self) -> Result<Domain, CommError> {
        match self.recv(0)? {
            Message::Domain(d) => Ok(*d),
            _ => Err(CommError::Protocol {
                peer: 0,
                expected: "domain descriptor",
            }),
        }
    }

    /// Refresh `field`'s ghost ring from the four cardinal neighbors.
    ///
    /// For each direction with a neighbor, the adjacent interior edge
    /// row/column is sent out and the matching ghost row/column received in.
    /// Must be called after any kernel whose output is later read across a
    /// sub-domain edge; exchanging twice with no intervening mutation leaves
    /// the ghost values unchanged.
    pub fn exchange_halo(&self, field: &mut Matrix, domain: &Domain) -> Result<(), CommError> {
        let size_x = domain.size_x;
        let size_y = domain.size_y;

        for dir in Direction::ALL {
            if let Some(peer) = domain.neighbor(dir) {
                let edge = match dir {
                    Direction::East => field.column(size_x),
                    Direction::West => field.column(1),
                    Direction::North => field.row(size_y),
                    Direction::South => field.row(1),
                };
                self.send(peer, Message::Edge(edge))?;
            }
        }

        for dir in Direction::ALL {
            if let Some(peer) = domain.neighbor(dir) {
                let edge = match self.recv(peer)? {
                    Message::Edge(e) => e,
                    _ => {
                        return Err(CommError::Protocol {
                            peer,
                            expected: "halo edge",
                        })
                    }
                };
                match dir {
                    Direction::East => field.set_column(size_x + 1, &edge),
                    Direction::West => field.set_column(0, &edge),
                    Direction::North => field.set_row(size_y + 1, &edge),
                    Direction::South => field.set_row(0, &edge),
                }
            }
        }
        Ok(())
    }

    /// Hand a batch of particles that crossed into `peer`'s sub-domain over.
    /// The batch may be empty; the peer must still receive it.
    pub fn send_particles(&self, peer: usize, particles: Vec<Particle>) -> Result<(), CommError> {
        self.send(peer, Message::Particles(particles))
    }

    /// Receive a particle batch handed over by `peer`.
    pub fn recv_particles(&self, peer: usize) -> Result<Vec<Particle>, CommError> {
        match self.recv(peer)? {
            Message::Particles(particles) => Ok(particles),
            _ => Err(CommError::Protocol {
                peer,
                expected: "particle batch",
            }),
        }
    }

    /// Global minimum over all ranks; every rank receives the same result.
    pub fn reduce_min(&self, value: f64) -> Result<f64, CommError> {
        self.reduce(value, f64::min)
    }

    /// Global sum over all ranks; every rank receives the same result.
    pub fn reduce_sum(&self, value: f64) -> Result<f64, CommError> {
        self.reduce(value, |a, b| a + b)
    }

    /// Synchronous all-reduce: gather to the coordinator, combine in rank
    /// order, broadcast the result back. Acts as a barrier.
    fn reduce(&self, value: f64, combine: impl Fn(f64, f64) -> f64) -> Result<f64, CommError> {
        if self.size == 1 {
            return Ok(value);
        }
        if self.is_coordinator() {
            let mut acc = value;
            for peer in 1..self.size {
                match self.recv(peer)? {
                    Message::Scalar(v) => acc = combine(acc, v),
                    _ => {
                        return Err(CommError::Protocol {
                            peer,
                            expected: "reduction operand",
                        })
                    }
                }
            }
            for peer in 1..self.size {
                self.send(peer, Message::Scalar(acc))?;
            }
            Ok(acc)
        } else {
            self.send(0, Message::Scalar(value))?;
            match self.recv(0)? {
                Message::Scalar(v) => Ok(v),
                _ => Err(CommError::Protocol {
                    peer: 0,
                    expected: "reduction result",
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decompose;
    use std::thread;

    #[test]
    fn test_single_rank_is_trivial() {
        let mut comms = CommHub::create(1);
        let comm = comms.remove(0);
        assert!(comm.is_coordinator());
        assert_eq!(comm.reduce_min(3.0).unwrap(), 3.0);

        let domain = decompose(4, 4, 1, 1, 1.0, 1.0, 0);
        let mut m = Matrix::with_value(4, 4, 1.0);
        let before = m.clone();
        comm.exchange_halo(&mut m, &domain).unwrap();
        assert_eq!(m, before);
    }

    #[test]
    fn test_reductions_across_ranks() {
        let comms = CommHub::create(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let x = comm.rank() as f64 + 1.0;
                    let min = comm.reduce_min(x).unwrap();
                    let sum = comm.reduce_sum(x).unwrap();
                    (min, sum)
                })
            })
            .collect();
        for h in handles {
            let (min, sum) = h.join().unwrap();
            assert_eq!(min, 1.0);
            assert_eq!(sum, 10.0);
        }
    }

    #[test]
    fn test_halo_exchange_and_idempotence() {
        // Two ranks side by side, each field filled with its own rank value.
        let comms = CommHub::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank();
                    let domain = decompose(8, 4, 2, 1, 1.0, 1.0, rank);
                    let mut m = Matrix::with_value(domain.size_x, domain.size_y, rank as f64);
                    comm.exchange_halo(&mut m, &domain).unwrap();
                    let first = m.clone();
                    comm.exchange_halo(&mut m, &domain).unwrap();
                    assert_eq!(m, first, "second exchange changed ghost values");
                    (rank, domain, m)
                })
            })
            .collect();
        for h in handles {
            let (rank, domain, m) = h.join().unwrap();
            let peer = if rank == 0 { 1.0 } else { 0.0 };
            if rank == 0 {
                // East ghost column came from rank 1.
                assert_eq!(m.column(domain.size_x + 1), vec![peer; domain.size_y + 2]);
                assert_eq!(m.column(0), vec![0.0; domain.size_y + 2]);
            } else {
                assert_eq!(m.column(0), vec![peer; domain.size_y + 2]);
            }
        }
    }

    #[test]
    fn test_particle_handover_between_neighbors() {
        let comms = CommHub::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank();
                    let peer = 1 - rank;
                    // Rank 0 hands one particle east; rank 1 hands nothing back.
                    let outgoing = if rank == 0 {
                        vec![Particle::new(0.55, 0.25)]
                    } else {
                        Vec::new()
                    };
                    comm.send_particles(peer, outgoing).unwrap();
                    comm.recv_particles(peer).unwrap()
                })
            })
            .collect();
        let received: Vec<Vec<Particle>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(received[0].is_empty());
        assert_eq!(received[1], vec![Particle::new(0.55, 0.25)]);
    }

    #[test]
    fn test_disconnect_is_fatal() {
        let mut comms = CommHub::create(2);
        let comm1 = comms.pop().unwrap();
        drop(comms); // rank 0 endpoint gone
        let err = comm1.reduce_min(1.0).unwrap_err();
        assert_eq!(err, CommError::Disconnected { peer: 0 });
    }
}
