use glam::{Mat4, Vec3, Vec4};

/// CPU side of the per-frame uniform region: a fixed-capacity byte range
/// with a monotonically advancing cursor and alignment-aware pushes.
///
/// Overrunning the capacity is a sizing bug, not a runtime condition, and
/// panics rather than truncating; truncated uniform data would corrupt
/// rendering invisibly.
pub struct LinearWriter {
    bytes: Vec<u8>,
    capacity: u32,
    head: u32,
}

impl LinearWriter {
    pub fn new(capacity: u32) -> Self {
        Self {
            bytes: vec![0; capacity as usize],
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn reset(&mut self) {
        self.head = 0;
    }

    /// The full backing storage; `[0, head)` holds this frame's data.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Advances the cursor to the next multiple of `alignment`.
    /// `alignment` must be a power of two.
    pub fn align_to(&mut self, alignment: u32) {
        assert!(
            alignment.is_power_of_two(),
            "uniform alignment must be a power of two, got {alignment}"
        );
        self.head = (self.head + alignment - 1) & !(alignment - 1);
    }

    /// Aligns, copies `data` at the cursor, advances the cursor by its length.
    pub fn push(&mut self, data: &[u8], alignment: u32) {
        self.align_to(alignment);
        let start = self.head as usize;
        let end = start + data.len();
        assert!(
            end as u64 <= self.capacity as u64,
            "uniform buffer overflow: write of {} bytes at {} exceeds capacity {}",
            data.len(),
            start,
            self.capacity
        );
        self.bytes[start..end].copy_from_slice(data);
        self.head = end as u32;
    }

    // Typed pushes follow the packing rules the shaders expect: scalars
    // align to 4, vec3/vec4/mat4 columns to 16.

    pub fn push_u32(&mut self, value: u32) {
        self.push(&value.to_ne_bytes(), 4);
    }

    pub fn push_f32(&mut self, value: f32) {
        self.push(&value.to_ne_bytes(), 4);
    }

    pub fn push_vec3(&mut self, value: Vec3) {
        self.push(bytemuck::bytes_of(&value.to_array()), 16);
    }

    pub fn push_vec4(&mut self, value: Vec4) {
        self.push(bytemuck::bytes_of(&value.to_array()), 16);
    }

    pub fn push_mat4(&mut self, value: Mat4) {
        self.push(bytemuck::bytes_of(&value.to_cols_array()), 16);
    }
}

/// GPU-resident uniform region fed by a [`LinearWriter`].
///
/// Sized once at startup to the device's maximum uniform binding size.
/// `begin_write` opens the single per-frame write pass and resets the
/// cursor; `end_write` uploads the written range. Draw calls bind
/// sub-ranges of `buffer()` at the offsets the packer recorded.
pub struct LinearBuffer {
    writer: LinearWriter,
    buffer: wgpu::Buffer,
    open: bool,
}

impl LinearBuffer {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FrameUniforms"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            writer: LinearWriter::new(capacity),
            buffer,
            open: false,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> u32 {
        self.writer.capacity()
    }

    /// Opens the frame's write pass. Panics if a pass is already open;
    /// concurrent write passes are a caller error.
    pub fn begin_write(&mut self) -> &mut LinearWriter {
        assert!(!self.open, "begin_write called while a write pass is open");
        self.open = true;
        self.writer.reset();
        &mut self.writer
    }

    /// Closes the write pass and uploads the written range.
    pub fn end_write(&mut self, queue: &wgpu::Queue) {
        assert!(self.open, "end_write called without begin_write");
        self.open = false;
        let used = self.writer.head() as usize;
        if used > 0 {
            queue.write_buffer(&self.buffer, 0, &self.writer.bytes()[..used]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_each_power_of_two_leaves_cursor_aligned() {
        for shift in 0..10 {
            let alignment = 1u32 << shift;
            let mut writer = LinearWriter::new(4096);
            writer.push(&[0xAB; 3], 1);
            writer.align_to(alignment);
            assert_eq!(writer.head() % alignment, 0);
            writer.push(&[0xCD; 4], alignment);
            assert_eq!((writer.head() - 4) % alignment, 0);
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_alignment_panics() {
        let mut writer = LinearWriter::new(64);
        writer.align_to(3);
    }

    #[test]
    fn push_advances_by_payload_length() {
        let mut writer = LinearWriter::new(256);
        writer.push(&[1; 10], 1);
        assert_eq!(writer.head(), 10);
        writer.push(&[2; 7], 1);
        assert_eq!(writer.head(), 17);
    }

    #[test]
    fn consecutive_pushes_never_overlap() {
        let mut writer = LinearWriter::new(256);
        writer.push(&[0x11; 12], 16);
        let first_end = writer.head();
        writer.push(&[0x22; 12], 16);
        assert!(writer.head() - 12 >= first_end);
        assert_eq!(&writer.bytes()[0..12], &[0x11; 12]);
        assert_eq!(&writer.bytes()[16..28], &[0x22; 12]);
    }

    #[test]
    #[should_panic(expected = "uniform buffer overflow")]
    fn push_past_capacity_panics() {
        let mut writer = LinearWriter::new(16);
        writer.push(&[0; 17], 1);
    }

    #[test]
    fn vec3_pushes_use_vec4_slots() {
        let mut writer = LinearWriter::new(256);
        writer.push_vec3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(writer.head(), 12);
        writer.push_vec3(Vec3::new(4.0, 5.0, 6.0));
        // Second vec3 lands on the next 16-byte boundary.
        assert_eq!(writer.head(), 28);
    }

    #[test]
    fn mat4_round_trips_bit_for_bit() {
        let mut writer = LinearWriter::new(256);
        let m = Mat4::from_cols_array(&[
            0.5, -1.25, 3.75, 4.0, //
            5.5, 6.0, -7.125, 8.0, //
            9.0, 10.5, 11.0, -12.0, //
            13.0, 14.0, 15.5, 16.0,
        ]);
        writer.push_u32(7);
        writer.push_mat4(m);
        let offset = 16usize;
        let raw: &[u8] = &writer.bytes()[offset..offset + 64];
        let cols: &[f32] = bytemuck::cast_slice(raw);
        assert_eq!(cols, &m.to_cols_array());
    }
}
