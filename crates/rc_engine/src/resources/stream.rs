//! Little-endian binary streams
//!
//! [`DataStream`] reads the private `RCMESH` / `RCSKEL` / `RCANIM` formats;
//! [`DataWriter`] produces them. Strings are a `u32` byte length followed by
//! UTF-8. Matrices are 16 `f32` in column-major order, quaternions are
//! `(x, y, z, w)`.

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Quat, Vec3};
use bytemuck::{AnyBitPattern, NoUninit};
use nalgebra::Quaternion;
use std::io::{Cursor, Read};

/// Readable byte stream over a resource
#[derive(Debug)]
pub struct DataStream {
    name: String,
    cursor: Cursor<Vec<u8>>,
}

impl DataStream {
    /// Wrap bytes read from `name`
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), cursor: Cursor::new(bytes) }
    }

    /// Resource name the bytes came from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes
    pub fn size(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.size().saturating_sub(self.cursor.position() as usize)
    }

    /// Whether the stream is exhausted
    pub fn eof(&self) -> bool {
        self.remaining() == 0
    }

    fn read_array<const N: usize>(&mut self) -> EngineResult<[u8; N]> {
        let mut bytes = [0; N];
        self.cursor.read_exact(&mut bytes).map_err(|e| self.truncated(e))?;
        Ok(bytes)
    }

    fn truncated(&self, error: std::io::Error) -> EngineError {
        EngineError::parse(format!("'{}' is truncated at byte {}", self.name, self.cursor.position()))
            .with_source(error)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> EngineResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a `u16`
    pub fn read_u16(&mut self) -> EngineResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a `u32`
    pub fn read_u32(&mut self) -> EngineResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32`
    pub fn read_i32(&mut self) -> EngineResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read an `f32`
    pub fn read_f32(&mut self) -> EngineResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> EngineResult<Vec<u8>> {
        if len > self.remaining() {
            return Err(EngineError::parse(format!(
                "'{}' wants {len} bytes, {} left",
                self.name,
                self.remaining()
            )));
        }
        let mut bytes = vec![0; len];
        self.cursor.read_exact(&mut bytes).map_err(|e| self.truncated(e))?;
        Ok(bytes)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> EngineResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| EngineError::parse(format!("'{}' contains invalid UTF-8", self.name)).with_source(e))
    }

    /// Read `count` plain values
    pub fn read_pod_array<T: AnyBitPattern>(&mut self, count: usize) -> EngineResult<Vec<T>> {
        let bytes = self.read_bytes(count * std::mem::size_of::<T>())?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Read `count` floats
    pub fn read_f32_array(&mut self, count: usize) -> EngineResult<Vec<f32>> {
        self.read_pod_array(count)
    }

    /// Read three floats
    pub fn read_vec3(&mut self) -> EngineResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Read an `(x, y, z, w)` quaternion and normalize it
    pub fn read_quat(&mut self) -> EngineResult<Quat> {
        let [x, y, z, w]: [f32; 4] = bytemuck::pod_read_unaligned(&self.read_bytes(16)?);
        Ok(Quat::from_quaternion(Quaternion::new(w, x, y, z)))
    }

    /// Read a column-major matrix
    pub fn read_mat4(&mut self) -> EngineResult<Mat4> {
        Ok(Mat4::from_column_slice(&self.read_f32_array(16)?))
    }

    /// Check a magic tag
    pub fn expect_magic(&mut self, magic: &[u8]) -> EngineResult<()> {
        let found = self.read_bytes(magic.len())?;
        if found != magic {
            return Err(EngineError::parse(format!(
                "'{}' is not a {} file",
                self.name,
                String::from_utf8_lossy(magic)
            )));
        }
        Ok(())
    }

    /// Everything that has not been read yet
    pub fn read_to_end(&mut self) -> EngineResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.remaining());
        self.cursor.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// The rest of the stream as UTF-8 text
    pub fn read_to_string(&mut self) -> EngineResult<String> {
        let bytes = self.read_to_end()?;
        String::from_utf8(bytes)
            .map_err(|e| EngineError::parse(format!("'{}' is not UTF-8 text", self.name)).with_source(e))
    }
}

/// Builds binary resource files
#[derive(Debug, Default)]
pub struct DataWriter {
    bytes: Vec<u8>,
}

impl DataWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// One byte
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.write_bytes(&[value])
    }

    /// A `u16`
    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// A `u32`
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// An `i32`
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// An `f32`
    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_u32(value.len() as u32).write_bytes(value.as_bytes())
    }

    /// Plain values
    pub fn write_pod_array<T: NoUninit>(&mut self, values: &[T]) -> &mut Self {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// Three floats
    pub fn write_vec3(&mut self, value: &Vec3) -> &mut Self {
        self.write_pod_array(&[value.x, value.y, value.z])
    }

    /// `(x, y, z, w)` quaternion
    pub fn write_quat(&mut self, value: &Quat) -> &mut Self {
        let q = value.quaternion();
        self.write_pod_array(&[q.i, q.j, q.k, q.w])
    }

    /// Column-major matrix
    pub fn write_mat4(&mut self, value: &Mat4) -> &mut Self {
        self.write_pod_array(value.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use approx::assert_relative_eq;

    #[test]
    fn test_mixed_values() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), 0.5);
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let mut writer = DataWriter::new();
        writer
            .write_bytes(b"RCTEST")
            .write_u32(7)
            .write_string("bone")
            .write_quat(&rotation)
            .write_mat4(&matrix)
            .write_pod_array(&[1.5f32, 2.5]);

        let mut stream = DataStream::from_bytes("test", writer.into_bytes());
        stream.expect_magic(b"RCTEST").unwrap();
        assert_eq!(stream.read_u32().unwrap(), 7);
        assert_eq!(stream.read_string().unwrap(), "bone");
        assert_relative_eq!(stream.read_quat().unwrap(), rotation, epsilon = 1e-6);
        assert_eq!(stream.read_mat4().unwrap(), matrix);
        assert_eq!(stream.read_f32_array(2).unwrap(), vec![1.5, 2.5]);
        assert!(stream.eof());
    }

    #[test]
    fn test_truncated_input_is_parse_error() {
        let mut stream = DataStream::from_bytes("short", vec![1, 2]);
        assert_eq!(stream.read_u32().unwrap_err().code(), ErrorCode::Parse);

        let mut stream = DataStream::from_bytes("string", vec![200, 0, 0, 0, b'a']);
        assert_eq!(stream.read_string().unwrap_err().code(), ErrorCode::Parse);
    }

    #[test]
    fn test_wrong_magic() {
        let mut stream = DataStream::from_bytes("mesh", b"RCSKEL".to_vec());
        assert_eq!(stream.expect_magic(b"RCMESH").unwrap_err().code(), ErrorCode::Parse);
    }
}
