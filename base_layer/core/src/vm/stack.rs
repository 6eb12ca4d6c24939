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

use crate::vm::VmError;

/// A bounded LIFO stack. Overflow and underflow are deterministic failures, never panics.
#[derive(Debug)]
pub struct Stack<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Stack<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) -> Result<(), VmError> {
        if self.items.len() >= self.capacity {
            return Err(VmError::StackOverflow);
        }
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T, VmError> {
        self.items.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn top(&self) -> Result<&T, VmError> {
        self.items.last().ok_or(VmError::StackUnderflow)
    }

    /// Truncate to `depth` items, discarding anything above.
    pub fn truncate(&mut self, depth: usize) {
        self.items.truncate(depth);
    }
}

impl<T: Clone> Stack<T> {
    pub fn dup(&mut self) -> Result<(), VmError> {
        let top = self.top()?.clone();
        self.push(top)
    }

    pub fn swap(&mut self) -> Result<(), VmError> {
        let len = self.items.len();
        if len < 2 {
            return Err(VmError::StackUnderflow);
        }
        self.items.swap(len - 1, len - 2);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_push_pop() {
        let mut stack = Stack::new(2);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.push(3), Err(VmError::StackOverflow));
        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn dup_and_swap() {
        let mut stack = Stack::new(8);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.dup().unwrap();
        assert_eq!(stack.pop(), Ok(2));
        stack.swap().unwrap();
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Ok(2));
    }
}
