use glam::Vec3;

/// Distance a drop falls on every update step.
pub const FALL_STEP: f32 = 0.5;
/// Height below which a drop gets recycled to the top of the column.
pub const RECYCLE_FLOOR: f32 = -1.75;
/// Offset added to a recycled drop, one full fall cycle.
pub const RECYCLE_SPAN: f32 = 60.0;

/// Corner of the spawn volume nearest the origin.
const SPAWN_MIN: Vec3 = Vec3::new(-10.0, 0.0, -12.5);
/// Edge lengths of the spawn volume.
const SPAWN_EXTENT: Vec3 = Vec3::new(20.0, 60.0, 20.0);

/// Fixed-capacity field of falling raindrop positions.
///
/// The count is set once at scatter time; recycling keeps every slot alive
/// for the lifetime of the field, so no allocation happens after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Rain {
    drops: Vec<Vec3>,
}

impl Rain {
    /// Scatters `count` drops across the spawn volume, deterministically per seed.
    pub fn scatter(count: usize, seed: u32) -> Self {
        let mut lcg = Lcg::new(seed);
        let drops = (0..count)
            .map(|_| {
                SPAWN_MIN
                    + SPAWN_EXTENT * Vec3::new(lcg.next_f32(), lcg.next_f32(), lcg.next_f32())
            })
            .collect();
        Self { drops }
    }

    /// Advances every drop by one fixed step, recycling drops below the floor.
    pub fn update(&mut self) {
        for drop in &mut self.drops {
            drop.y -= FALL_STEP;
            if drop.y < RECYCLE_FLOOR {
                drop.y += RECYCLE_SPAN;
            }
        }
    }

    pub fn drops(&self) -> &[Vec3] {
        &self.drops
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }
}

/// Small linear congruential generator, enough to scatter the rain field.
#[derive(Debug, Clone)]
struct Lcg(u32);

impl Lcg {
    fn new(seed: u32) -> Self {
        Self(seed)
    }

    /// Next sample in [0, 1).
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.0 >> 8) as f32 / (1 << 24) as f32
    }
}
