use crate::vector::Vector;

/// Clears a container to zeros without changing its shape.
pub trait ZeroOut {
    fn zero_out(&mut self);
}

impl ZeroOut for [f64] {
    fn zero_out(&mut self) {
        for elem in self {
            *elem = 0.0;
        }
    }
}

impl ZeroOut for Vector {
    fn zero_out(&mut self) {
        self.as_mut_slice().zero_out();
    }
}
