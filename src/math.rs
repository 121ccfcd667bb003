/// Complex number on the fractal plane. `re` is the horizontal axis, `im` the vertical.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct C {
    pub re: f64,
    pub im: f64,
}

impl C {
    pub const ZERO: C = C { re: 0.0, im: 0.0 };

    pub fn new(re: f64, im: f64) -> Self {
        C { re, im }
    }

    pub fn abs_sq(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    pub fn add(&self, other: C) -> C {
        C::new(self.re + other.re, self.im + other.im)
    }

    pub fn scale(&self, k: f64) -> C {
        C::new(self.re * k, self.im * k)
    }

    /// z² + c, expanded component-wise.
    pub fn square_add(&self, c: C) -> C {
        C::new(
            self.re * self.re - self.im * self.im + c.re,
            2.0 * self.re * self.im + c.im,
        )
    }

    /// Burning Ship fold: both components made non-negative.
    pub fn fold_abs(&self) -> C {
        C::new(self.re.abs(), self.im.abs())
    }
}
