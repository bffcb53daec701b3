//! The simulated stack.
//!
//! A contiguous byte buffer backing the inclusive address range `[top, bot]`.
//! Addresses below `top` or above `bot` are made available by
//! [`Stack::ensure_covers`], which reallocates and keeps every byte at its
//! old address.

use tracing::debug;

use crate::vm::Error;

/// Stack alignment granule, in bytes.
pub const WORD_BYTES: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
  bytes: Vec<u8>,
  top: u64,
  bot: u64,
  limit: u64,
}

impl Stack {
  /// A single zeroed word: the one containing `sp`.
  ///
  /// Both bounds start word aligned, and growth only ever moves them to
  /// other word boundaries.
  pub fn new(sp: u64, limit: u64) -> Self {
    let top = sp - sp % WORD_BYTES;
    Self {
      bytes: vec![0; WORD_BYTES as usize],
      top,
      bot: top + (WORD_BYTES - 1),
      limit,
    }
  }

  /// Lowest address backed by the buffer.
  pub fn top(&self) -> u64 {
    self.top
  }

  /// Highest address backed by the buffer (inclusive).
  pub fn bot(&self) -> u64 {
    self.bot
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn contains(&self, address: u64) -> bool {
    self.top <= address && address <= self.bot
  }

  /// Consecutive 8 byte rows starting at `top`, with their addresses.
  pub fn rows(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
    self
      .bytes
      .chunks(WORD_BYTES as usize)
      .enumerate()
      .map(|(i, row)| (self.top + i as u64 * WORD_BYTES, row))
  }

  /// Grows the buffer until `address` lies within `[top, bot]`.
  pub fn ensure_covers(&mut self, address: u64) -> Result<(), Error> {
    if address < self.top {
      self.grow_up(address)
    } else if address > self.bot {
      self.grow_down(address)
    } else {
      Ok(())
    }
  }

  // new low end, rounded down to a word boundary
  fn grow_up(&mut self, address: u64) -> Result<(), Error> {
    let new_top = address - address % WORD_BYTES;
    let fresh = self.top - new_top;
    let len = self.checked_len(address, (self.bot - new_top).saturating_add(1))?;

    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.resize(fresh as usize, 0);
    bytes.extend_from_slice(&self.bytes);

    debug!(
      old_top = self.top,
      new_top, bot = self.bot, "stack grew towards lower addresses"
    );
    self.bytes = bytes;
    self.top = new_top;
    Ok(())
  }

  // new high end, one past the next word boundary
  fn grow_down(&mut self, address: u64) -> Result<(), Error> {
    let end = (address - address % WORD_BYTES)
      .checked_add(WORD_BYTES)
      .ok_or(Error::StackLimit {
        address,
        limit: self.limit,
      })?;
    let len = self.checked_len(address, end - self.top)?;

    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.extend_from_slice(&self.bytes);
    bytes.resize(len, 0);

    debug!(
      top = self.top,
      old_bot = self.bot,
      new_bot = end - 1,
      "stack grew towards higher addresses"
    );
    self.bytes = bytes;
    self.bot = end - 1;
    Ok(())
  }

  fn checked_len(&self, address: u64, len: u64) -> Result<usize, Error> {
    let limit = self.limit;
    if len > limit {
      return Err(Error::StackLimit { address, limit });
    }
    usize::try_from(len).map_err(|_| Error::StackLimit { address, limit })
  }

  fn span(&self, address: u64, len: u64) -> Result<std::ops::Range<usize>, Error> {
    let last = address.checked_add(len - 1);
    match last {
      Some(last) if self.contains(address) && self.contains(last) => {
        let start = (address - self.top) as usize;
        Ok(start..start + len as usize)
      }
      _ => Err(Error::StackOutOfBounds {
        address,
        top: self.top,
        bot: self.bot,
      }),
    }
  }

  fn read<const N: usize>(&self, address: u64) -> Result<[u8; N], Error> {
    let span = self.span(address, N as u64)?;
    let mut out = [0; N];
    out.copy_from_slice(&self.bytes[span]);
    Ok(out)
  }

  fn write(&mut self, address: u64, data: &[u8]) -> Result<(), Error> {
    let span = self.span(address, data.len() as u64)?;
    self.bytes[span].copy_from_slice(data);
    Ok(())
  }

  pub fn read_u32(&self, address: u64) -> Result<u32, Error> {
    self.read(address).map(u32::from_le_bytes)
  }

  pub fn read_u64(&self, address: u64) -> Result<u64, Error> {
    self.read(address).map(u64::from_le_bytes)
  }

  pub fn write_u32(&mut self, address: u64, value: u32) -> Result<(), Error> {
    self.write(address, &value.to_le_bytes())
  }

  pub fn write_u64(&mut self, address: u64, value: u64) -> Result<(), Error> {
    self.write(address, &value.to_le_bytes())
  }
}
