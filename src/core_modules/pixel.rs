// THEORY:
// The `Pixel` module is the most fundamental unit of the motion engine. It is a
// "dumb" data container for a single RGBA sample plus the handful of
// single-pixel and pairwise channel measures the differencing and aggregation
// stages are built from.
//
// Key principles:
// 1) Alpha never takes part in a motion measure. Only R, G and B are summed,
//    averaged or differenced.
// 2) Integer arithmetic where exactness matters: channel sums are kept as `u16`
//    so callers can defer division (and rounding) to the last possible step.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type ChannelSum = u16;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// An opaque gray pixel with all three color channels set to `value`.
        pub fn gray(value: Channel) -> Self {
            Pixel::new(value, value, value, Channel::MAX)
        }

        /// Sum of the R, G and B channels (0..=765). Alpha is excluded.
        pub fn channel_sum(&self) -> ChannelSum {
            self.red as ChannelSum + self.green as ChannelSum + self.blue as ChannelSum
        }

        /// Mean of the R, G and B channels (0.0..=255.0).
        pub fn channel_mean(&self) -> f32 {
            self.channel_sum() as f32 / 3.0
        }

        /// Sum of the channel-wise absolute differences of R, G and B.
        pub fn abs_delta_sum(&self, other: &Pixel) -> ChannelSum {
            self.red.abs_diff(other.red) as ChannelSum
                + self.green.abs_diff(other.green) as ChannelSum
                + self.blue.abs_diff(other.blue) as ChannelSum
        }

        /// Mean channel-wise absolute difference against `other` (0.0..=255.0).
        pub fn abs_delta_mean(&self, other: &Pixel) -> f32 {
            self.abs_delta_sum(other) as f32 / 3.0
        }

        pub fn to_bytes(self) -> [Byte; CHANNELS] {
            [self.red, self.green, self.blue, self.alpha]
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<Pixel> for [Byte; CHANNELS] {
        fn from(pixel: Pixel) -> Self {
            pixel.to_bytes()
        }
    }

}
